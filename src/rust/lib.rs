// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![cfg_attr(feature = "strict", deny(warnings))]
#![deny(clippy::all)]

#[macro_use]
extern crate log;

pub mod adapter;
pub mod coroutine;
pub mod runtime;
pub mod sink;

pub use self::{
    adapter::{
        Arguments,
        AsyncReturn,
        Asynchronous,
        Outcome,
        Routine,
    },
    coroutine::{
        early_return,
        early_return_call,
        Arg,
        AsyncCoroutine,
        BoxCoroutine,
        Continuation,
        Coroutine,
        DeferredCall,
        EarlyReturn,
        Exit,
        Operation,
        Payload,
        Received,
        Reply,
        Resumption,
        ReturnValue,
        SharedTrampoline,
        Status,
        Step,
        Suspender,
        Trampoline,
    },
    runtime::{
        Config,
        Fail,
        SharedEventLoop,
        SharedScheduler,
    },
    sink::{
        CompletionSink,
        ResponseWriter,
        SharedSink,
    },
};

//======================================================================================================================
// Constants
//======================================================================================================================

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//======================================================================================================================
// Macros
//======================================================================================================================

/// Bails out of the enclosing `anyhow::Result` function if the two expressions are not equal.
#[macro_export]
macro_rules! ensure_eq {
    ($left:expr, $right:expr $(,)?) => {{
        match (&$left, &$right) {
            (left_val, right_val) => {
                if *left_val != *right_val {
                    ::anyhow::bail!(
                        "ensure failed: `(left == right)` left: `{:?}`, right: `{:?}` ({}:{})",
                        left_val,
                        right_val,
                        file!(),
                        line!()
                    );
                }
            },
        }
    }};
}

/// Bails out of the enclosing `anyhow::Result` function if the two expressions are equal.
#[macro_export]
macro_rules! ensure_neq {
    ($left:expr, $right:expr $(,)?) => {{
        match (&$left, &$right) {
            (left_val, right_val) => {
                if *left_val == *right_val {
                    ::anyhow::bail!(
                        "ensure failed: `(left != right)` left: `{:?}`, right: `{:?}` ({}:{})",
                        left_val,
                        right_val,
                        file!(),
                        line!()
                    );
                }
            },
        }
    }};
}
