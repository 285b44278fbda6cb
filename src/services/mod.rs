pub mod ai_service;
pub mod conversation;
pub mod grading_service;
pub mod prompts;
pub mod quiz_queue;
pub mod response_parser;
pub mod session_service;
