pub mod llm_client;
pub mod responder;
