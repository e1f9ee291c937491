// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

pub mod bridge;
pub mod common;
pub mod context;
pub mod error;
pub mod identity;
pub mod imap;
pub mod logger;
pub mod matrix;
pub mod mime;
pub mod poller;
pub mod relay;
pub mod scheduler;
pub mod settings;
pub mod smtp;
pub mod transport;
pub mod utils;
