pub mod config;
pub mod error;
pub mod orchestrator;
pub mod session;
pub mod store;
pub mod core {
    pub mod compiler;
    pub mod results;
    pub mod template;
}
pub mod ai {
    pub mod client;
    pub mod fallback;
    pub mod prompts;
    pub mod response;
    pub mod schema_utils;
    pub mod stages;
}
