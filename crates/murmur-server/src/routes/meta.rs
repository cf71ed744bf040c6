//! Health and submission option catalogue endpoints.

use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// GET /api/health
pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// GET /api/config
///
/// The option catalogue a submission UI renders. Values, not policy: the
/// server accepts any combination that passes submission validation.
pub async fn submission_options() -> impl IntoResponse {
    Json(json!({
        "models": [
            {"value": "tiny", "label": "Tiny (Fastest, ~1GB VRAM)"},
            {"value": "small", "label": "Small (Fast, ~2GB VRAM)"},
            {"value": "medium", "label": "Medium (Balanced, ~4GB VRAM)"},
            {"value": "large-v2", "label": "Large-v2 (Accurate, ~8GB VRAM)"},
            {"value": "large-v3", "label": "Large-v3 (Best, ~8GB VRAM)"}
        ],
        "devices": [
            {"value": "cuda", "label": "GPU (CUDA)"},
            {"value": "cpu", "label": "CPU (Slower)"}
        ],
        "languages": [
            {"value": "auto", "label": "Auto-detect"},
            {"value": "en", "label": "English"},
            {"value": "sr", "label": "Serbian"},
            {"value": "ru", "label": "Russian"},
            {"value": "es", "label": "Spanish"},
            {"value": "fr", "label": "French"},
            {"value": "de", "label": "German"},
            {"value": "it", "label": "Italian"},
            {"value": "pt", "label": "Portuguese"},
            {"value": "pl", "label": "Polish"},
            {"value": "uk", "label": "Ukrainian"},
            {"value": "tr", "label": "Turkish"},
            {"value": "nl", "label": "Dutch"},
            {"value": "ar", "label": "Arabic"},
            {"value": "zh", "label": "Chinese"},
            {"value": "ja", "label": "Japanese"},
            {"value": "ko", "label": "Korean"},
            {"value": "hi", "label": "Hindi"},
            {"value": "cs", "label": "Czech"},
            {"value": "hr", "label": "Croatian"}
        ],
        "beamSizes": [
            {"value": 1, "label": "1 (Fastest, greedy)"},
            {"value": 5, "label": "5 (Fast)"},
            {"value": 10, "label": "10 (Balanced)"},
            {"value": 12, "label": "12 (Better)"},
            {"value": 15, "label": "15 (Great)"},
            {"value": 20, "label": "20 (Excellent)"},
            {"value": 25, "label": "25 (Best Quality)"}
        ],
        "workers": [
            {"value": 1, "label": "1 (Sequential)"},
            {"value": 2, "label": "2 (Parallel)"},
            {"value": 3, "label": "3 (Parallel)"},
            {"value": 4, "label": "4 (Parallel)"}
        ],
        "vadOptions": [
            {"value": false, "label": "Disabled"},
            {"value": true, "label": "Enabled (Better quality)"}
        ],
        "computeTypes": [
            {"value": "float16", "label": "Float16 (Fastest, GPU)"},
            {"value": "float32", "label": "Float32 (CPU compatible)"},
            {"value": "int8_float16", "label": "Int8 (Fastest, quantized)"}
        ],
        "temperatures": [
            {"value": 0.0, "label": "0.0 (Deterministic, no randomness)"},
            {"value": 0.2, "label": "0.2 (Recommended)"},
            {"value": 0.4, "label": "0.4 (Noisy speech)"},
            {"value": 0.6, "label": "0.6 (Very noisy)"},
            {"value": 0.8, "label": "0.8 (Extreme noise)"}
        ]
    }))
}
