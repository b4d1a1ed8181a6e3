use async_trait::async_trait;

use super::{Gate, GateRejection, GateRequest, RequestContext, Stage};
use crate::services::TokenSigner;

const GATE: &str = "step_up";
const TOKEN_PARAM: &str = "token";

/// Requires a step-up token issued to the account of the bound session.
///
/// The token is read from the `token` query parameter, falling back to a
/// `token` field in a JSON body.
pub struct StepUpGate {
    tokens: TokenSigner,
}

impl StepUpGate {
    pub fn new(tokens: TokenSigner) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl Gate for StepUpGate {
    fn name(&self) -> &'static str {
        GATE
    }

    fn stage(&self) -> Stage {
        Stage::StepUp
    }

    fn reads_body_token(&self) -> bool {
        true
    }

    async fn admit(
        &self,
        request: &GateRequest,
        ctx: &mut RequestContext,
    ) -> Result<(), GateRejection> {
        let bound = ctx
            .session
            .as_ref()
            .ok_or_else(|| GateRejection::unauthorized(GATE, "no session bound"))?;

        let token = request
            .query(TOKEN_PARAM)
            .or_else(|| request.body_token())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GateRejection::forbidden(GATE, "step-up token missing"))?;

        let subject = self
            .tokens
            .verify(token)
            .map_err(|e| GateRejection::forbidden(GATE, e.to_string()))?;

        if subject != bound.account_id {
            return Err(GateRejection::forbidden(
                GATE,
                "step-up token issued to another account",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::gate::{BoundSession, Rejection};
    use crate::models::Device;
    use chrono::Duration;
    use secrecy::Secret;
    use std::sync::Arc;

    fn signer(clock: Arc<ManualClock>) -> TokenSigner {
        TokenSigner::new(&Secret::new("k".to_string()), Duration::minutes(5), clock).unwrap()
    }

    fn bound(account: &str) -> RequestContext {
        RequestContext {
            session: Some(BoundSession {
                account_id: account.to_string(),
                session_id: "sid".to_string(),
            }),
        }
    }

    fn request() -> GateRequest {
        GateRequest::new(Device::new("ua", "127.0.0.1"))
    }

    #[tokio::test]
    async fn accepts_token_from_query_or_body() {
        let clock = Arc::new(ManualClock::default());
        let signer = signer(clock);
        let token = signer.issue("acc").unwrap();
        let gate = StepUpGate::new(signer);

        let from_query = request().with_query("token", token.clone());
        let from_body = request().with_body_token(Some(token));

        assert!(gate.admit(&from_query, &mut bound("acc")).await.is_ok());
        assert!(gate.admit(&from_body, &mut bound("acc")).await.is_ok());
    }

    #[tokio::test]
    async fn rejects_missing_expired_and_foreign_tokens() {
        let clock = Arc::new(ManualClock::default());
        let signer = signer(clock.clone());
        let foreign = signer.issue("other").unwrap();
        let expiring = signer.issue("acc").unwrap();
        let gate = StepUpGate::new(signer);

        let missing = gate.admit(&request(), &mut bound("acc")).await.unwrap_err();
        assert_eq!(missing.kind, Rejection::Forbidden);

        let wrong_subject = gate
            .admit(&request().with_query("token", foreign), &mut bound("acc"))
            .await
            .unwrap_err();
        assert_eq!(wrong_subject.kind, Rejection::Forbidden);

        clock.advance(Duration::minutes(5));
        let expired = gate
            .admit(&request().with_query("token", expiring), &mut bound("acc"))
            .await
            .unwrap_err();
        assert_eq!(expired.kind, Rejection::Forbidden);
    }

    #[tokio::test]
    async fn requires_a_bound_session() {
        let clock = Arc::new(ManualClock::default());
        let signer = signer(clock);
        let token = signer.issue("acc").unwrap();
        let gate = StepUpGate::new(signer);

        let rejection = gate
            .admit(
                &request().with_query("token", token),
                &mut RequestContext::default(),
            )
            .await
            .unwrap_err();

        assert_eq!(rejection.kind, Rejection::Unauthorized);
    }
}
