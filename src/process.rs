// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 工作进程生命周期词汇
//!
//! 宿主用这些值描述工作进程的状态与回收原因。序数值需要与线路上的表示保持一致，
//! 因此显式标注，不允许依赖声明顺序。

use std::process;

use chrono::{DateTime, Duration, Local};
use serde_derive::Serialize;

/// 工作进程的运行状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum ProcessStatus {
    Alive = 1,
    ShuttingDown = 2,
    ShutDown = 3,
    Terminated = 4,
}

/// 工作进程被关闭或回收的原因。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum ProcessShutdownReason {
    None = 0,
    Unexpected = 1,
    RequestsLimit = 2,
    RequestQueueLimit = 3,
    Timeout = 4,
    IdleTimeout = 5,
    MemoryLimitExceeded = 6,
    PingFailed = 7,
    DeadlockSuspected = 8,
}

impl ProcessStatus {
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(value: u8) -> Option<Self> {
        match value {
            1 => Some(ProcessStatus::Alive),
            2 => Some(ProcessStatus::ShuttingDown),
            3 => Some(ProcessStatus::ShutDown),
            4 => Some(ProcessStatus::Terminated),
            _ => None,
        }
    }
}

impl ProcessShutdownReason {
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(value: u8) -> Option<Self> {
        use ProcessShutdownReason::*;
        let reason = match value {
            0 => None,
            1 => Unexpected,
            2 => RequestsLimit,
            3 => RequestQueueLimit,
            4 => Timeout,
            5 => IdleTimeout,
            6 => MemoryLimitExceeded,
            7 => PingFailed,
            8 => DeadlockSuspected,
            _ => return Option::None,
        };
        Some(reason)
    }
}

/// 某一时刻的工作进程信息快照。
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    start_time: DateTime<Local>,
    age: Duration,
    process_id: u32,
    request_count: u64,
    status: ProcessStatus,
    shutdown_reason: ProcessShutdownReason,
}

impl ProcessInfo {
    pub fn new(
        start_time: DateTime<Local>,
        request_count: u64,
        status: ProcessStatus,
        shutdown_reason: ProcessShutdownReason,
    ) -> Self {
        Self {
            start_time,
            age: Local::now() - start_time,
            process_id: process::id(),
            request_count,
            status,
            shutdown_reason,
        }
    }

    pub fn start_time(&self) -> DateTime<Local> {
        self.start_time
    }

    pub fn age(&self) -> Duration {
        self.age
    }

    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    pub fn status(&self) -> ProcessStatus {
        self.status
    }

    pub fn shutdown_reason(&self) -> ProcessShutdownReason {
        self.shutdown_reason
    }
}
