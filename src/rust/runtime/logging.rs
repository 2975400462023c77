// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use ::flexi_logger::{
    Logger,
    LoggerHandle,
};
use ::std::sync::Once;

//==============================================================================
// Constants
//==============================================================================

/// Log specification used when neither the caller nor `RUST_LOG` provides one.
pub const DEFAULT_LOG_SPEC: &str = "info";

//==============================================================================
// Static Variables
//==============================================================================

/// Guardian to the logging initialize function.
static INIT_LOG: Once = Once::new();

//==============================================================================
// Standalone Functions
//==============================================================================

/// Initializes logging features with the default log specification.
pub fn initialize() {
    initialize_with(DEFAULT_LOG_SPEC);
}

/// Initializes logging features. The `RUST_LOG` environment variable overrides `spec`. Only the first call has any
/// effect.
pub fn initialize_with(spec: &str) {
    INIT_LOG.call_once(|| match Logger::try_with_env_or_str(spec).and_then(|logger| logger.start()) {
        // The handle flushes and shuts the logger down when dropped, so it lives for the rest of the process.
        Ok(handle) => ::std::mem::forget::<LoggerHandle>(handle),
        Err(e) => eprintln!("initialize(): failed to start logger ({:?})", e),
    });
}
