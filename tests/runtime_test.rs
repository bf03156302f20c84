// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

#[cfg(test)]
mod runtime_tests {
    use std::{fs, sync::Arc};

    use tempfile::TempDir;
    use webhandler::{
        AsyncFnHandler, Config, HandlerFactory, HttpContext, HttpHandler, HttpRequestMethod, HttpRuntime,
        ModuleCollection, ProcessShutdownReason, ProcessStatus, Request, RootMapPath,
    };

    fn site() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
        fs::write(dir.path().join("app.js"), "console.log('x');".repeat(200)).unwrap();
        fs::write(dir.path().join("web.toml"), "secret = true").unwrap();
        fs::create_dir(dir.path().join("assets")).unwrap();
        dir
    }

    fn config_for(dir: &TempDir, extra: &str) -> Config {
        let content = format!(
            "www_root = {:?}\nmodules = [\"access_log\", \"trace\"]\n{}",
            dir.path().to_string_lossy(),
            extra
        );
        Config::from_str_or_default(&content, Some("test.toml"))
    }

    fn raw(request: &str) -> Request {
        Request::try_from(request.as_bytes(), 0).unwrap()
    }

    fn send(ctx: &mut HttpContext) -> String {
        let mut out = Vec::new();
        ctx.send_to(&mut out).unwrap();
        String::from_utf8_lossy(&out).to_string()
    }

    #[tokio::test]
    async fn test_static_file_roundtrip() {
        let dir = site();
        let runtime = HttpRuntime::from_config(&config_for(&dir, "")).unwrap();

        let mut ctx = runtime
            .execute(raw("GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n"))
            .await;
        let response = send(&mut ctx);

        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Type: text/html;charset=utf-8\r\n"));
        assert!(response.contains("Cache-Control: private\r\n"));
        assert!(response.ends_with("<h1>home</h1>"));
    }

    #[tokio::test]
    async fn test_compression_negotiated() {
        let dir = site();
        let runtime = HttpRuntime::from_config(&config_for(&dir, "")).unwrap();
        let ctx = runtime
            .execute(raw("GET /app.js HTTP/1.1\r\nAccept-Encoding: br, deflate\r\n\r\n"))
            .await;
        let head = String::from_utf8_lossy(&ctx.response().as_bytes()).to_string();
        assert!(head.contains("Content-Encoding: deflate\r\n"));
    }

    #[tokio::test]
    async fn test_status_codes() {
        let dir = site();
        let runtime = HttpRuntime::from_config(&config_for(&dir, "")).unwrap();
        let cases = [
            ("GET /web.toml HTTP/1.1\r\n\r\n", 403),
            ("GET /assets HTTP/1.1\r\n\r\n", 403),
            ("GET /nothing.html HTTP/1.1\r\n\r\n", 404),
            ("DELETE /index.html HTTP/1.1\r\n\r\n", 405),
            ("GET /../secret HTTP/1.1\r\n\r\n", 400),
        ];
        for (request, status) in cases {
            let ctx = runtime.execute(raw(request)).await;
            assert_eq!(ctx.response().status_code(), status, "{}", request.trim());
        }
        let ctx = runtime.execute(raw("DELETE /index.html HTTP/1.1\r\n\r\n")).await;
        assert_eq!(ctx.response().header("Allow"), Some("GET, HEAD"));
    }

    #[tokio::test]
    async fn test_head_request() {
        let dir = site();
        let runtime = HttpRuntime::from_config(&config_for(&dir, "")).unwrap();
        let mut ctx = runtime.execute(raw("HEAD /index.html HTTP/1.1\r\n\r\n")).await;
        let response = send(&mut ctx);
        assert!(response.contains("Content-Length: 13\r\n"));
        assert!(response.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_configured_cache_and_trace() {
        let dir = site();
        let extra = "[trace]\nenabled = true\nmode = \"sort_by_category\"\n\n[cache]\ncacheability = \"public\"\nrevalidation = \"all_caches\"\nmax_age = 120\n";
        let runtime = HttpRuntime::from_config(&config_for(&dir, extra)).unwrap();

        let ctx = runtime.execute(raw("GET /index.html HTTP/1.1\r\n\r\n")).await;
        assert_eq!(
            ctx.response().cache().cache_control(),
            "public, must-revalidate, max-age=120"
        );

        let json = ctx.trace().to_json();
        assert_eq!(json["mode"], "sort_by_category");
        let entries = json["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["category"], "webhandler");
    }

    #[tokio::test]
    async fn test_custom_async_route() {
        let dir = site();
        let mut factory = HandlerFactory::new(4);
        factory
            .register("GET", "/api/*", || -> Arc<dyn HttpHandler> {
                Arc::new(AsyncFnHandler::new("api", true, |mut ctx: HttpContext| async move {
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                    let path = ctx.request().url_path().to_string();
                    ctx.response_mut().set_content_type("application/json");
                    ctx.response_mut().write(&format!("{{\"path\":\"{}\"}}", path));
                    Ok(ctx)
                }))
            })
            .unwrap();
        let factory = Arc::new(factory);
        let runtime = Arc::new(HttpRuntime::new(
            factory.clone(),
            Arc::new(RootMapPath::new(dir.path())),
            ModuleCollection::new(),
        ));

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let runtime = Arc::clone(&runtime);
                tokio::spawn(async move {
                    let request = Request::new(HttpRequestMethod::Get, &format!("/api/item{}?q=1", i));
                    runtime.execute(request).await
                })
            })
            .collect();
        for (i, task) in tasks.into_iter().enumerate() {
            let ctx = task.await.unwrap();
            assert_eq!(ctx.response().body(), format!("{{\"path\":\"/api/item{}\"}}", i).as_bytes());
        }
        assert_eq!(factory.outstanding(), 0);
        assert!(factory.pooled(0) <= 4);
    }

    #[tokio::test]
    async fn test_shutdown_lifecycle() {
        let dir = site();
        let runtime = HttpRuntime::from_config(&config_for(&dir, "")).unwrap();
        runtime.execute(raw("GET /index.html HTTP/1.1\r\n\r\n")).await;
        assert_eq!(runtime.status(), ProcessStatus::Alive);

        runtime.shutdown(ProcessShutdownReason::RequestsLimit);
        let info = runtime.process_info();
        assert_eq!(info.status(), ProcessStatus::ShutDown);
        assert_eq!(info.shutdown_reason(), ProcessShutdownReason::RequestsLimit);
        assert_eq!(info.request_count(), 1);
        assert_eq!(info.process_id(), std::process::id());

        let ctx = runtime.execute(raw("GET /index.html HTTP/1.1\r\n\r\n")).await;
        assert_eq!(ctx.response().status_code(), 503);
    }

    #[test]
    fn test_unknown_module_is_rejected() {
        let config = Config::from_str_or_default("modules = [\"php\"]\n", None);
        assert!(HttpRuntime::from_config(&config).is_err());
    }
}
