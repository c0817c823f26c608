pub const SUMMARY_SYSTEM: &str = "You are an analyst writing post-broadcast recaps for a \
    broadcaster's management team. You are factual and specific, and you only cite \
    usernames, amounts and moments that appear in the data or transcript provided. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences around the JSON.";

/// Placeholders: {instructions}, {data}, {transcript}.
pub const SUMMARY_PROMPT_TEMPLATE: &str = r#"Write a recap of the broadcast below.

## House instructions
{instructions}

## Collected data (JSON)
{data}

## Transcript
{transcript}

Return a JSON object with exactly these string fields (use null when there is nothing to say):
{
  "theme": "short title for the broadcast",
  "overall_vibe": "...",
  "engagement_summary": "...",
  "tracking_notes": "notes on regulars, friends and new faces worth tracking",
  "private_dynamics": "...",
  "opportunities": "...",
  "chat_highlights": "...",
  "themes_moments": "...",
  "overall_summary": "...",
  "full_markdown": "the complete recap as a markdown document"
}"#;

/// Used when no instructions document could be loaded.
pub const DEFAULT_INSTRUCTIONS: &str = "No house instructions provided. \
    Keep each section to a short paragraph.";
