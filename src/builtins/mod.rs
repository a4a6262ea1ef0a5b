pub mod core_modules;

pub use core_modules::{
    register_core, DirectCallDispatcher, CORE_EXTENSION, DIRECT_CALL_DISPATCHER,
    DIRECT_CALL_PATH, DISPATCHER_PATH, LIBRARY_LOADED_PATH, LOG_MESSAGE_PATH,
    VALUE_COMPARISON_PATH,
};
