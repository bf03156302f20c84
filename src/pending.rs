// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 挂起操作模块
//!
//! 异步处理器的 begin/end 协议建立在这里的一对类型上：
//! - [`PendingOperation`]：begin 返回给调用方的句柄，是完成状态与结果的唯一来源。
//! - [`Completer`]：交给执行方的一次性完成器，完成时保存结果、唤醒等待者并触发回调。
//!
//! 回调是 `FnOnce`，完成器在完成时被消耗，因此回调最多触发一次；
//! 完成器被丢弃而未完成时会以 500 故障完成，保证回调恰好触发一次。
//! 在回调执行完毕前调用 `end`、或重复取回结果，都属于宿主的使用错误，会直接 panic。

use std::{
    any::Any,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use log::warn;
use tokio::sync::Notify;

use crate::exception::HttpException;

/// 调用方随 begin 传入、在完成时原样带回的附加数据。
pub type ExtraData = Option<Arc<dyn Any + Send + Sync>>;

/// 操作完成时触发的回调，可能在与 begin 不同的线程上执行。
pub type AsyncCallback<T> = Box<dyn FnOnce(&PendingOperation<T>) + Send + 'static>;

struct Shared<T> {
    result: Mutex<Option<Result<T, HttpException>>>,
    completed: AtomicBool,
    /// 回调执行完毕后置位，等待者以此为准
    settled: AtomicBool,
    retrieved: AtomicBool,
    notify: Notify,
}

/// 一个进行中的异步操作的句柄。
pub struct PendingOperation<T> {
    shared: Arc<Shared<T>>,
    extra_data: ExtraData,
}

/// 操作执行方持有的完成器。
pub struct Completer<T> {
    shared: Arc<Shared<T>>,
    callback: Option<AsyncCallback<T>>,
    extra_data: ExtraData,
    done: bool,
}

impl<T> PendingOperation<T> {
    /// 创建一个新的挂起操作，返回调用方句柄与执行方完成器。
    pub fn new(callback: AsyncCallback<T>, extra_data: ExtraData) -> (Self, Completer<T>) {
        let shared = Arc::new(Shared {
            result: Mutex::new(None),
            completed: AtomicBool::new(false),
            settled: AtomicBool::new(false),
            retrieved: AtomicBool::new(false),
            notify: Notify::new(),
        });
        let handle = Self {
            shared: Arc::clone(&shared),
            extra_data: extra_data.clone(),
        };
        let completer = Completer {
            shared,
            callback: Some(callback),
            extra_data,
            done: false,
        };
        (handle, completer)
    }

    pub fn is_completed(&self) -> bool {
        self.shared.completed.load(Ordering::Acquire)
    }

    /// begin 时传入的附加数据
    pub fn async_state(&self) -> &ExtraData {
        &self.extra_data
    }

    /// 等待操作完成且回调执行完毕，不取回结果。
    pub async fn wait(&self) {
        loop {
            // 先登记再检查，避免错过 notify_waiters 的唤醒
            let notified = self.shared.notify.notified();
            if self.shared.settled.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }

    /// 取回操作结果，或重新抛出处理期间捕获的故障。
    ///
    /// # Panics
    /// 操作尚未完成或回调仍在执行，或结果已经被取回过。
    pub fn end(self) -> Result<T, HttpException> {
        if !self.shared.settled.load(Ordering::Acquire) {
            panic!("在异步操作完成之前调用了 end，这是宿主的使用错误");
        }
        if self.shared.retrieved.swap(true, Ordering::AcqRel) {
            panic!("异步操作的结果已经被取回过，end 只能调用一次");
        }
        let mut slot = match self.shared.result.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("异步结果锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        };
        match slot.take() {
            Some(result) => result,
            None => panic!("异步操作已标记完成但没有结果"),
        }
    }

    fn view(shared: &Arc<Shared<T>>, extra_data: &ExtraData) -> Self {
        Self {
            shared: Arc::clone(shared),
            extra_data: extra_data.clone(),
        }
    }
}

impl<T> fmt::Debug for PendingOperation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingOperation")
            .field("completed", &self.is_completed())
            .field("retrieved", &self.shared.retrieved.load(Ordering::Acquire))
            .finish()
    }
}

impl<T> Completer<T> {
    /// 以给定结果完成操作并触发回调。
    pub fn complete(mut self, result: Result<T, HttpException>) {
        self.finish(result);
    }

    fn finish(&mut self, result: Result<T, HttpException>) {
        if self.done {
            return;
        }
        self.done = true;
        {
            let mut slot = match self.shared.result.lock() {
                Ok(lock) => lock,
                Err(poisoned) => {
                    warn!("异步结果锁被污染，恢复并继续");
                    poisoned.into_inner()
                }
            };
            *slot = Some(result);
        }
        self.shared.completed.store(true, Ordering::Release);
        if let Some(callback) = self.callback.take() {
            callback(&PendingOperation::view(&self.shared, &self.extra_data));
        }
        self.shared.settled.store(true, Ordering::Release);
        self.shared.notify.notify_waiters();
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if !self.done {
            warn!("异步操作的完成器在完成之前被丢弃，按内部错误完成");
            self.finish(Err(HttpException::internal(
                "asynchronous operation was abandoned before completion",
            )));
        }
    }
}
