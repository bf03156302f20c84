// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 演示宿主
//!
//! 从文件参数或标准输入读取一个原始 HTTP 请求，交给 [`HttpRuntime`] 处理，
//! 把响应写到标准输出。启用跟踪时，跟踪记录以 JSON 形式写到标准错误。

use log::{error, info, warn};
use tokio::runtime::Builder;

use std::{
    env, fs,
    io::{self, Read},
    process,
};

use webhandler::{Config, HttpRuntime, ProcessShutdownReason, Request};

const CONFIG_FILE: &str = "config/development.toml";
const LOG_CONFIG_FILE: &str = "config/log4rs.yaml";

fn read_input() -> io::Result<Vec<u8>> {
    match env::args().nth(1) {
        Some(path) => fs::read(path),
        None => {
            let mut buffer = Vec::new();
            io::stdin().read_to_end(&mut buffer)?;
            Ok(buffer)
        }
    }
}

fn main() {
    // 日志配置缺失时继续运行，只是没有日志输出
    if let Err(e) = log4rs::init_file(LOG_CONFIG_FILE, Default::default()) {
        eprintln!("无法加载日志配置{}：{}，将不输出日志", LOG_CONFIG_FILE, e);
    }

    let config = match Config::from_toml(CONFIG_FILE) {
        Ok(c) => c,
        Err(e) => {
            warn!("{}，使用默认配置", e);
            Config::new()
        }
    };
    info!("配置文件已载入");

    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(r) => r,
        Err(e) => {
            error!("无法创建异步运行时：{}", e);
            process::exit(1);
        }
    };

    let host = match HttpRuntime::from_config(&config) {
        Ok(h) => h,
        Err(e) => {
            error!("无法根据配置创建运行时：{}", e);
            process::exit(1);
        }
    };

    let input = match read_input() {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("读取请求失败：{}", e);
            process::exit(1);
        }
    };
    let request = match Request::try_from(&input, 0) {
        Ok(r) => r,
        Err(e) => {
            error!("解析HTTP请求失败: {}", e);
            process::exit(2);
        }
    };

    let mut context = runtime.block_on(host.execute(request));
    let stdout = io::stdout();
    if let Err(e) = context.send_to(&mut stdout.lock()) {
        error!("写出响应失败：{}", e);
    }
    if context.trace().is_enabled() {
        eprintln!("{}", context.trace().to_json());
    }

    host.shutdown(ProcessShutdownReason::None);
    let info = host.process_info();
    info!(
        "进程{}共处理{}个请求，运行{}ms",
        info.process_id(),
        info.request_count(),
        info.age().num_milliseconds()
    );
}
