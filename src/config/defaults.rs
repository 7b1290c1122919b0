//! Default values for configuration

/// Default embedding backend kind
pub fn default_embedding_backend() -> String {
    if cfg!(feature = "local-embed") {
        "local".to_string()
    } else {
        "http".to_string()
    }
}

/// Default embedding model (all-MiniLM-L6-v2, 384 dimensions)
pub fn default_embedding_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

/// Default embedding dimension
pub fn default_embedding_dimension() -> usize {
    384
}

/// Default batch size for embedding
pub fn default_embedding_batch_size() -> usize {
    32
}

/// Default embedding backend URL
pub fn default_embedding_backend_url() -> String {
    std::env::var("KBASE_EMBEDDING_BACKEND_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:7997".to_string())
}

/// Default timeout for a single embedding call
pub fn default_embedding_timeout() -> u64 {
    30
}

/// Default maximum characters per chunk
pub fn default_chunk_max_chars() -> usize {
    512
}

/// Default overlap characters between chunks
pub fn default_chunk_overlap() -> usize {
    50
}

/// Default number of search results
pub fn default_query_k() -> usize {
    5
}

/// Default maximum results allowed
pub fn default_query_max_results() -> usize {
    50
}

/// Default minimum score (cosine floor, filters nothing)
pub fn default_query_min_score() -> f32 {
    -1.0
}

/// Default number of results fed into an answer
pub fn default_answer_max_results() -> usize {
    3
}

/// Default characters of each source document put in the context
pub fn default_answer_max_chars_per_result() -> usize {
    1000
}

/// Default top score above which retrieved evidence counts as complete
pub fn default_completeness_threshold() -> f32 {
    0.5
}

/// Default LLM API base URL (Groq, OpenAI-compatible)
pub fn default_llm_base_url() -> String {
    std::env::var("KBASE_LLM_BASE_URL")
        .unwrap_or_else(|_| "https://api.groq.com/openai/v1".to_string())
}

/// Default LLM model
pub fn default_llm_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

/// Default environment variable holding the LLM API key
pub fn default_llm_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

/// Default LLM request timeout in seconds
pub fn default_llm_timeout() -> u64 {
    60
}

/// Default sampling temperature
pub fn default_llm_temperature() -> f32 {
    0.7
}

/// Default attempts for upstream calls (first try included)
pub fn default_retry_max_attempts() -> u32 {
    2
}

/// Default initial backoff between attempts
pub fn default_retry_base_delay_ms() -> u64 {
    200
}
