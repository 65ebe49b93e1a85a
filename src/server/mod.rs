//! HTTP server layer.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │        GET /tile/[{mosaic}/]{level}/{row}/{column}              │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │          routes             │  │
//! │  │ (ETag, 304, gzip, JSON   │  │ (router, CORS, tracing)     │  │
//! │  │  errors)                 │  │                             │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    accepts_gzip, etag_matches, health_handler, tile_handler, AppState, ErrorResponse,
    HealthResponse, DEFAULT_CACHE_MAX_AGE,
};
pub use routes::{create_router, RouterConfig};
