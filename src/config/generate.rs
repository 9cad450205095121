pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# LEXIFILL CONFIGURATION
# =============================================================================
# Enriches a vocabulary list with generated fields (example sentences, part of
# speech, short glosses...) using an OpenAI-compatible chat-completions API.
#
# Runs are resumable: every result is written to the checkpoint file, and a
# re-run only attempts words that are not in it yet.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/lexifill/config.yml
#   3. /etc/lexifill/config.yml
#
# Any value may reference environment variables as $env{NAME}.

# =============================================================================
# SOURCE
# =============================================================================
# CSV file with a header row. Column names are matched case-insensitively.
source:
  path: words.csv
  key_column: word
  value_column: translation
  # Only attempt words starting with this prefix (case-insensitive).
  # Override per run with --prefix.
  prefix: a

# =============================================================================
# CHECKPOINT
# =============================================================================
# JSON array of results. Rewritten in full after every wave of requests.
checkpoint:
  path: out/A.json
  pretty: true

# =============================================================================
# SERVICE
# =============================================================================
service:
  # e.g. $env{OPENAI_BASE_URL}
  base_url: https://api.openai.com/v1
  model: gpt-4o-mini
  # Name of the environment variable holding the API key
  api_key_env: OPENAI_API_KEY
  temperature: 0.7
  # Per-request timeout; a timeout counts as a failed unit
  timeout: 60s
  # Request response_format {"type": "json_object"}
  json_mode: false
  retry:
    # Total attempts for timeouts, connection errors, 429 and 5xx.
    # 1 means failed words are left for the next run.
    max_attempts: 1
    backoff: 2s

# =============================================================================
# TASK
# =============================================================================
# Placeholders: {word} and {translation} of the first item in a request,
# {items} for every item as a JSON array of {"word", "translation"}.
# Use {items} when scheduler.unit_size is greater than 1.
task:
  system: You are a helpful English tutor. Reply with JSON only, no Markdown.
  template: |
    Write one natural example sentence for the English word "{word}"
    (meaning: {translation}). Also give its main part of speech.
    Reply as {"word": "...", "pos": "...", "sentence": "..."}
  # template_path: prompts/sentence.txt
  fields:
    - pos
    - sentence

# =============================================================================
# SCHEDULER
# =============================================================================
scheduler:
  # Maximum requests in flight; also the size of a wave between checkpoint writes
  concurrency: 4
  # Items per request
  unit_size: 1
  # Pause between waves to stay under rate limits
  wave_delay: 1s
"#
    .to_string()
}
