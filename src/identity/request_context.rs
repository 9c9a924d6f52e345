use uuid::Uuid;

use super::Principal;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub principal: Option<Principal>,
    pub request_id: String,
}

impl RequestContext {
    pub fn new() -> Self {
        Self { principal: None, request_id: Uuid::new_v4().to_string() }
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }
}

impl Default for RequestContext {
    fn default() -> Self { Self::new() }
}
