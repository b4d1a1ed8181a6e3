use async_trait::async_trait;
use subtle::ConstantTimeEq;

use super::{
    CookieDirective, Gate, GateRejection, GateRequest, RequestContext, ResponseEffects, Stage,
};
use crate::config::CsrfSettings;
use crate::utils::random_token;

const GATE: &str = "csrf";

/// Double-submit token. Nothing is stored server-side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken(String);

impl CsrfToken {
    pub fn generate() -> Result<Self, anyhow::Error> {
        Ok(Self(random_token()?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Cookie and header agree and neither is empty. Constant time in the
    /// token contents.
    pub fn pair_matches(cookie: &str, header: &str) -> bool {
        !cookie.is_empty()
            && !header.is_empty()
            && bool::from(cookie.as_bytes().ct_eq(header.as_bytes()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrfMode {
    /// Checks the presented pair, then rotates it.
    Verifying,
    /// Only hands out a pair. Used where the caller cannot hold one yet.
    Issuing,
}

pub struct CsrfGate {
    mode: CsrfMode,
    cookie_name: String,
    header_name: String,
    ttl_seconds: i64,
}

impl CsrfGate {
    pub fn verifying(settings: &CsrfSettings) -> Self {
        Self::with_mode(CsrfMode::Verifying, settings)
    }

    pub fn issuing(settings: &CsrfSettings) -> Self {
        Self::with_mode(CsrfMode::Issuing, settings)
    }

    fn with_mode(mode: CsrfMode, settings: &CsrfSettings) -> Self {
        Self {
            mode,
            cookie_name: settings.cookie_name.clone(),
            header_name: settings.header_name.clone(),
            ttl_seconds: settings.ttl_seconds,
        }
    }

    pub fn mode(&self) -> CsrfMode {
        self.mode
    }
}

#[async_trait]
impl Gate for CsrfGate {
    fn name(&self) -> &'static str {
        GATE
    }

    fn stage(&self) -> Stage {
        Stage::Csrf
    }

    async fn admit(
        &self,
        request: &GateRequest,
        _ctx: &mut RequestContext,
    ) -> Result<(), GateRejection> {
        if self.mode == CsrfMode::Issuing {
            return Ok(());
        }

        let cookie = request
            .cookie(&self.cookie_name)
            .ok_or_else(|| GateRejection::unauthorized(GATE, "csrf cookie missing"))?;

        let header = request.header(&self.header_name).unwrap_or_default();

        if !CsrfToken::pair_matches(cookie, header) {
            return Err(GateRejection::forbidden(
                GATE,
                "csrf header does not match cookie",
            ));
        }

        Ok(())
    }

    async fn complete(
        &self,
        _request: &GateRequest,
        _ctx: &RequestContext,
        handler_succeeded: bool,
        effects: &mut ResponseEffects,
    ) -> Result<(), GateRejection> {
        // A failed login must not hand out a pair.
        if self.mode == CsrfMode::Issuing && !handler_succeeded {
            return Ok(());
        }

        let token = CsrfToken::generate()
            .map_err(|e| GateRejection::internal(GATE, format!("token generation: {}", e)))?
            .into_string();

        effects.cookies.push(CookieDirective {
            name: self.cookie_name.clone(),
            value: token.clone(),
            max_age_seconds: self.ttl_seconds,
            http_only: false,
        });
        effects.headers.push((self.header_name.clone(), token));
        Ok(())
    }
}
