use serde_json::{json, Value};

/// Instructions for the turquoise momentum strategy on an M1 chart.
pub fn strategy_prompt(allow_sell: bool) -> String {
    let direction_rule = if allow_sell {
        "- Emit SELL only when both turquoise lines mirror the rules above downwards \
         (Momentum crossing the centre line from above, Williams crossing -80 from above) \
         and the previous candle is red with a full body."
    } else {
        "- NEVER suggest SELL. If the chart is falling, return WAIT."
    };

    format!(
        r#"Act as the analytical engine of a one-minute (M1) chart scanner.
Identify CALL entries for the opening of the next M1 candle.

TURQUOISE STRATEGY:
1. MOMENTUM (period 5): find the TURQUOISE line. It must be crossing the grey centre line upwards RIGHT NOW, at the birth of the candle.
2. WILLIAMS MOMENTUM (period 7): find the TURQUOISE line. It must be crossing the -20 level upwards at the same time.

SIGNAL CONDITIONS (BUY):
- Emit BUY only if both turquoise lines confirm bullish strength.
- The previous candle must be green with a real body.
- No resistance or giant upper wicks may block the move.
{direction_rule}

Your job is to give the signal at the exact moment the new candle is born.
Answer with a single JSON object that follows the provided schema and nothing else."#
    )
}

/// JSON schema for the structured response.
pub fn response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "signal": { "type": "string", "enum": ["BUY", "SELL", "WAIT"] },
            "confidence": { "type": "number", "minimum": 0, "maximum": 100 },
            "reasoning": { "type": "string", "description": "Detailed technical explanation" },
            "momentumCrossing": { "type": "boolean", "description": "Momentum(5) turquoise crossing the centre line upwards" },
            "williamsCrossing": { "type": "boolean", "description": "Williams(7) turquoise crossing -20 upwards" },
            "rsiValue": { "type": "number" },
            "zoneDetected": { "type": "string", "enum": ["X", "N", "M", "W", "Z", "None"] },
            "condition": { "type": "string", "enum": ["Zona Zero", "Normal", "Manipulação"] },
            "trend": { "type": "string", "enum": ["LTA", "LTB", "Neutral"] },
            "multiTimeframeConfirmation": { "type": "boolean" },
            "candleStrength": { "type": "string", "enum": ["Weak", "Medium", "Strong"] }
        },
        "required": [
            "signal", "confidence", "reasoning", "momentumCrossing", "williamsCrossing",
            "rsiValue", "zoneDetected", "condition", "trend",
            "multiTimeframeConfirmation", "candleStrength"
        ],
        "additionalProperties": false
    })
}
