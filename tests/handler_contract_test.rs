// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

#[cfg(test)]
mod handler_contract_tests {
    use std::{
        collections::HashMap,
        path::Path,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
    };

    use proptest::prelude::*;
    use webhandler::{
        AsyncCallback, AsyncHttpHandler, ExtraData, ForbiddenHandler, HandlerFactory, HttpApplication,
        HttpCacheability, HttpContext, HttpException, HttpHandler, HttpHandlerFactory, HttpModule,
        HttpRequestMethod, MethodNotAllowedHandler, ModuleCollection, ModuleState, PendingOperation,
        PendingRequest, PipelineEvent, ProcessShutdownReason, ProcessStatus, Request, TraceMode,
    };

    fn any_method() -> impl Strategy<Value = HttpRequestMethod> {
        prop_oneof![
            Just(HttpRequestMethod::Get),
            Just(HttpRequestMethod::Head),
            Just(HttpRequestMethod::Options),
            Just(HttpRequestMethod::Post),
            Just(HttpRequestMethod::Put),
            Just(HttpRequestMethod::Delete),
            Just(HttpRequestMethod::Patch),
            Just(HttpRequestMethod::Trace),
        ]
    }

    proptest! {
        #[test]
        fn forbidden_handler_always_403(method in any_method(), path in "/[a-z0-9/._-]{0,24}", repeat in 1usize..4) {
            let handler = ForbiddenHandler;
            for _ in 0..repeat {
                let mut ctx = HttpContext::new(Request::new(method, &path), 0);
                let err = handler.process_request(&mut ctx).unwrap_err();
                prop_assert_eq!(err.status_code(), 403);
                prop_assert!(handler.is_reusable());
                prop_assert!(ctx.response().body().is_empty());
            }
        }

        #[test]
        fn method_not_allowed_handler_always_405(method in any_method(), path in "/[a-z0-9/._-]{0,24}", repeat in 1usize..4) {
            let handler = MethodNotAllowedHandler;
            for _ in 0..repeat {
                let mut ctx = HttpContext::new(Request::new(method, &path), 0);
                let err = handler.process_request(&mut ctx).unwrap_err();
                prop_assert_eq!(err.status_code(), 405);
                prop_assert!(handler.is_reusable());
            }
        }
    }

    /// 按实例计数的工厂替身：每次借出加一，每次释放减一，减到负数即为重复释放。
    #[derive(Default)]
    struct CountingFactory {
        counts: Mutex<HashMap<usize, isize>>,
    }

    impl CountingFactory {
        fn key(handler: &Arc<dyn HttpHandler>) -> usize {
            Arc::as_ptr(handler) as *const () as usize
        }
    }

    impl HttpHandlerFactory for CountingFactory {
        fn get_handler(
            &self,
            _context: &HttpContext,
            _request_type: HttpRequestMethod,
            _url: &str,
            _path_translated: &Path,
        ) -> Result<Arc<dyn HttpHandler>, HttpException> {
            let handler: Arc<dyn HttpHandler> = Arc::new(ForbiddenHandler);
            *self.counts.lock().unwrap().entry(Self::key(&handler)).or_insert(0) += 1;
            Ok(handler)
        }

        fn release_handler(&self, handler: Arc<dyn HttpHandler>) {
            let mut counts = self.counts.lock().unwrap();
            let count = counts.entry(Self::key(&handler)).or_insert(0);
            *count -= 1;
            assert!(*count >= 0, "handler released more often than it was obtained");
        }
    }

    fn context(method: HttpRequestMethod, url: &str) -> HttpContext {
        HttpContext::new(Request::new(method, url), 0)
    }

    #[test]
    fn single_release_is_valid_on_counting_factory() {
        let factory = CountingFactory::default();
        let ctx = context(HttpRequestMethod::Get, "/");
        let handler = factory
            .get_handler(&ctx, HttpRequestMethod::Get, "/", Path::new("/"))
            .unwrap();
        factory.release_handler(handler);
    }

    #[test]
    #[should_panic(expected = "handler released more often than it was obtained")]
    fn double_release_is_detected_by_counting_factory() {
        let factory = CountingFactory::default();
        let ctx = context(HttpRequestMethod::Get, "/");
        let handler = factory
            .get_handler(&ctx, HttpRequestMethod::Get, "/", Path::new("/"))
            .unwrap();
        factory.release_handler(Arc::clone(&handler));
        factory.release_handler(handler);
    }

    fn pooled_factory() -> HandlerFactory {
        let mut factory = HandlerFactory::new(2);
        factory
            .register("*", "*", || -> Arc<dyn HttpHandler> { Arc::new(ForbiddenHandler) })
            .unwrap();
        factory
    }

    #[test]
    #[should_panic(expected = "释放了一个不在借出状态的处理器")]
    fn double_release_is_detected_by_pooled_factory() {
        let factory = pooled_factory();
        let ctx = context(HttpRequestMethod::Get, "/a");
        let handler = factory
            .get_handler(&ctx, HttpRequestMethod::Get, "/a", Path::new("/a"))
            .unwrap();
        factory.release_handler(Arc::clone(&handler));
        factory.release_handler(handler);
    }

    #[test]
    fn release_after_new_checkout_is_valid() {
        let factory = pooled_factory();
        let ctx = context(HttpRequestMethod::Get, "/a");
        for _ in 0..3 {
            let handler = factory
                .get_handler(&ctx, HttpRequestMethod::Get, "/a", Path::new("/a"))
                .unwrap();
            factory.release_handler(handler);
        }
        assert_eq!(factory.outstanding(), 0);
        assert_eq!(factory.pooled(0), 1);
    }

    /// 记录调用顺序的异步处理器替身，完成由测试手动触发。
    struct OrderedAsync {
        events: Arc<Mutex<Vec<&'static str>>>,
        completer: Mutex<Option<webhandler::Completer<HttpContext>>>,
        context: Mutex<Option<HttpContext>>,
    }

    impl OrderedAsync {
        fn new() -> Self {
            Self {
                events: Arc::new(Mutex::new(Vec::new())),
                completer: Mutex::new(None),
                context: Mutex::new(None),
            }
        }

        fn finish(&self) {
            let completer = self.completer.lock().unwrap().take().unwrap();
            let ctx = self.context.lock().unwrap().take().unwrap();
            self.events.lock().unwrap().push("complete");
            completer.complete(Ok(ctx));
        }
    }

    impl HttpHandler for OrderedAsync {
        fn is_reusable(&self) -> bool {
            false
        }

        fn process_request(&self, _context: &mut HttpContext) -> Result<(), HttpException> {
            Err(HttpException::internal("async only"))
        }

        fn as_async(&self) -> Option<&dyn AsyncHttpHandler> {
            Some(self)
        }
    }

    impl AsyncHttpHandler for OrderedAsync {
        fn begin_process_request(
            &self,
            context: HttpContext,
            callback: AsyncCallback<HttpContext>,
            extra_data: ExtraData,
        ) -> PendingRequest {
            self.events.lock().unwrap().push("begin");
            let events = Arc::clone(&self.events);
            let (pending, completer) = PendingOperation::new(
                Box::new(move |op: &PendingOperation<HttpContext>| {
                    assert!(op.is_completed());
                    events.lock().unwrap().push("callback");
                    callback(op);
                }),
                extra_data,
            );
            *self.completer.lock().unwrap() = Some(completer);
            *self.context.lock().unwrap() = Some(context);
            pending
        }

        fn end_process_request(&self, handle: PendingRequest) -> Result<HttpContext, HttpException> {
            self.events.lock().unwrap().push("end");
            handle.end()
        }
    }

    #[test]
    #[should_panic(expected = "在异步操作完成之前调用了 end")]
    fn end_before_callback_is_detected() {
        let handler = OrderedAsync::new();
        let pending = handler.begin_process_request(
            context(HttpRequestMethod::Get, "/slow"),
            Box::new(|_| {}),
            None,
        );
        let _ = handler.end_process_request(pending);
    }

    #[test]
    fn begin_callback_end_in_order() {
        let handler = OrderedAsync::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);
        let pending = handler.begin_process_request(
            context(HttpRequestMethod::Get, "/slow"),
            Box::new(move |_| {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            }),
            None,
        );
        assert!(!pending.is_completed());
        handler.finish();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        let ctx = handler.end_process_request(pending).unwrap();
        assert_eq!(ctx.request().path(), "/slow");
        assert_eq!(
            *handler.events.lock().unwrap(),
            vec!["begin", "complete", "callback", "end"]
        );
    }

    #[test]
    fn callback_may_fire_on_another_thread() {
        let handler = Arc::new(OrderedAsync::new());
        let (tx, rx) = std::sync::mpsc::channel();
        let pending = handler.begin_process_request(
            context(HttpRequestMethod::Get, "/thread"),
            Box::new(move |_| {
                tx.send(std::thread::current().id()).unwrap();
            }),
            None,
        );
        let worker = Arc::clone(&handler);
        let worker_id = std::thread::spawn(move || {
            worker.finish();
            std::thread::current().id()
        })
        .join()
        .unwrap();

        assert_eq!(rx.recv().unwrap(), worker_id);
        assert!(handler.end_process_request(pending).is_ok());
    }

    /// 把 init/dispose 次数写到共享计数器里的模块
    struct CountingModule {
        inits: Arc<AtomicUsize>,
        disposes: Arc<AtomicUsize>,
    }

    impl HttpModule for CountingModule {
        fn name(&self) -> &str {
            "counting"
        }

        fn init(&mut self, application: &mut HttpApplication) {
            self.inits.fetch_add(1, Ordering::SeqCst);
            application.add_handler(PipelineEvent::EndRequest, Arc::new(|_: &mut HttpContext| Ok(())));
        }

        fn dispose(&mut self) {
            self.disposes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting_modules() -> (ModuleCollection, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let inits = Arc::new(AtomicUsize::new(0));
        let disposes = Arc::new(AtomicUsize::new(0));
        let mut modules = ModuleCollection::new();
        modules.add(Box::new(CountingModule {
            inits: Arc::clone(&inits),
            disposes: Arc::clone(&disposes),
        }));
        (modules, inits, disposes)
    }

    #[test]
    fn dispose_once_after_init() {
        let (mut modules, inits, disposes) = counting_modules();
        let mut app = HttpApplication::new();
        modules.init_all(&mut app);
        assert!(modules.dispose(0));
        assert_eq!(inits.load(Ordering::SeqCst), 1);
        assert_eq!(disposes.load(Ordering::SeqCst), 1);
        assert_eq!(modules.state(0), Some(ModuleState::Disposed));
    }

    // 重复初始化不受支持，这里故意触发，确认共享的应用上下文没有被重复登记
    #[test]
    fn deliberate_double_init_does_not_corrupt_application() {
        let (mut modules, inits, _) = counting_modules();
        let mut app = HttpApplication::new();
        modules.init_all(&mut app);
        modules.init_all(&mut app);
        assert!(!modules.init(0, &mut app));

        assert_eq!(inits.load(Ordering::SeqCst), 1);
        assert_eq!(app.handler_count(PipelineEvent::EndRequest), 1);
        assert_eq!(modules.state(0), Some(ModuleState::Initialized));
    }

    #[test]
    fn enum_ordinals_match() {
        assert_eq!(HttpCacheability::NoCache as u8, 1);
        assert_eq!(HttpCacheability::Private as u8, 2);
        assert_eq!(HttpCacheability::Server as u8, 3);
        assert_eq!(HttpCacheability::Public as u8, 4);
        assert_eq!(ProcessStatus::Alive as u8, 1);
        assert_eq!(ProcessStatus::ShuttingDown as u8, 2);
        assert_eq!(ProcessStatus::ShutDown as u8, 3);
        assert_eq!(ProcessStatus::Terminated as u8, 4);
        assert_eq!(TraceMode::SortByTime as u8, 0);
        assert_eq!(TraceMode::Default as u8, 2);
        assert_eq!(ProcessShutdownReason::None as u8, 0);
        assert_eq!(ProcessShutdownReason::DeadlockSuspected as u8, 8);
    }

    proptest! {
        #[test]
        fn cacheability_ordinal_roundtrip(ordinal in 0u8..8) {
            match HttpCacheability::from_ordinal(ordinal) {
                Some(c) => prop_assert_eq!(c.ordinal(), ordinal),
                None => prop_assert!(ordinal == 0 || ordinal > 4),
            }
        }

        #[test]
        fn shutdown_reason_ordinal_roundtrip(ordinal in 0u8..16) {
            match ProcessShutdownReason::from_ordinal(ordinal) {
                Some(r) => prop_assert_eq!(r.ordinal(), ordinal),
                None => prop_assert!(ordinal > 8),
            }
        }
    }
}
