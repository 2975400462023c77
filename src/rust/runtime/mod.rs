// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Exports
//======================================================================================================================

pub mod config;
pub mod fail;
pub mod logging;
pub mod scheduler;

pub use self::{
    config::Config,
    fail::Fail,
    scheduler::{
        Callback,
        Schedule,
        SharedEventLoop,
        SharedScheduler,
    },
};
