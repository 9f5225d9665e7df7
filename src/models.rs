use serde::{Deserialize, Serialize};

// Envelope for every error the gateway produces itself
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

// GET /health response
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub tracked_clients: usize,
    pub healthy_backends: usize,
    pub total_backends: usize,
}

// Identity the limiter charged the request to, stored in request extensions
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientIdentity(pub String);
