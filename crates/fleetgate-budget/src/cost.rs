/// Heuristic token estimate from request shape, used for the precheck cost
/// estimate (spec.md §3: "estimates come from simple heuristics on request
/// size and `max_tokens`").
///
/// `prompt_chars` is the total length of the serialized prompt/messages;
/// `max_tokens` is the client-requested completion ceiling, defaulted when
/// absent.
pub fn estimate_tokens(prompt_chars: usize, max_tokens: Option<u32>) -> (u64, u64) {
    const CHARS_PER_TOKEN: f64 = 4.0;
    const DEFAULT_COMPLETION_TOKENS: u64 = 256;

    let prompt_tokens = ((prompt_chars as f64) / CHARS_PER_TOKEN).ceil() as u64;
    let completion_tokens = max_tokens.map(u64::from).unwrap_or(DEFAULT_COMPLETION_TOKENS);
    (prompt_tokens.max(1), completion_tokens)
}

/// `estimated_cost = (estimated_prompt_tokens × prompt_price +
/// estimated_completion_tokens × completion_price)` (spec.md §3), with
/// prices expressed per 1,000 tokens as instance configuration does.
pub fn estimate_cost(prompt_tokens: u64, completion_tokens: u64, prompt_price_per_1k: f64, completion_price_per_1k: f64) -> f64 {
    (prompt_tokens as f64 / 1000.0) * prompt_price_per_1k + (completion_tokens as f64 / 1000.0) * completion_price_per_1k
}
