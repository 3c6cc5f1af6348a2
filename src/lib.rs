// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

mod otel;

pub mod ack;
pub mod channel;
pub mod dispatch;
pub mod errors;
pub mod gateway;
pub mod handler;
pub mod inbound;
pub mod message;
pub mod router;
pub mod topology;
