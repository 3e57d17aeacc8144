use std::error::Error;

use opentelemetry::Context;
use opentelemetry_instrumentation::ClientInstrumenter;

use crate::resend::HttpClientResend;

const DEFAULT_MAX_REDIRECTS: u32 = 20;

/// Drives an instrumented HTTP client call chain that may follow redirects.
///
/// Every hop is its own operation: a fresh span with its own URL and
/// status, ended before the next hop starts. All hops share one resend
/// counter installed in the chain context, so the second hop carries
/// `http.request.resend_count` 1, the third 2, and so on; the first hop
/// reports nothing.
///
/// The chain stops at the first non-redirecting response, at
/// `max_redirects`, or when the redirect strategy reports an error (e.g. a
/// circular redirect); strategy errors end the current hop with that error.
#[derive(Debug, Clone)]
pub struct RedirectExec {
    max_redirects: u32,
}

impl Default for RedirectExec {
    fn default() -> Self {
        RedirectExec {
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

impl RedirectExec {
    /// A chain following at most `max_redirects` redirects.
    pub fn new(max_redirects: u32) -> Self {
        RedirectExec { max_redirects }
    }

    /// Executes the call chain.
    ///
    /// `inject` writes the hop context's propagation headers into the
    /// outgoing request, typically via
    /// [`ClientInstrumenter::inject`] and a carrier such as
    /// [`HeaderInjector`](crate::HeaderInjector). `execute` performs one
    /// real request. `redirect` inspects a response and produces the
    /// follow-up request when the client would redirect, `None` when the
    /// response is final, or an error for an invalid redirect.
    pub fn execute<REQUEST, RESPONSE, E>(
        &self,
        instrumenter: &ClientInstrumenter<REQUEST, RESPONSE>,
        parent_cx: &Context,
        request: REQUEST,
        mut inject: impl FnMut(&Context, &mut REQUEST),
        mut execute: impl FnMut(&Context, &REQUEST) -> Result<RESPONSE, E>,
        redirect: impl Fn(&REQUEST, &RESPONSE, u32) -> Result<Option<REQUEST>, E>,
    ) -> Result<RESPONSE, E>
    where
        E: Error,
    {
        let chain_cx = HttpClientResend::initialize(parent_cx.clone());
        if !instrumenter.should_start(&chain_cx, &request) {
            return execute(&chain_cx, &request);
        }

        let mut current = request;
        let mut hop: u32 = 0;
        loop {
            let cx = instrumenter.start(&chain_cx, &current);
            inject(&cx, &mut current);
            match execute(&cx, &current) {
                Ok(response) => {
                    if hop >= self.max_redirects {
                        instrumenter.end(&cx, &current, Some(&response), None);
                        return Ok(response);
                    }
                    match redirect(&current, &response, hop) {
                        Ok(Some(next)) => {
                            instrumenter.end(&cx, &current, Some(&response), None);
                            current = next;
                            hop += 1;
                        }
                        Ok(None) => {
                            instrumenter.end(&cx, &current, Some(&response), None);
                            return Ok(response);
                        }
                        Err(error) => {
                            instrumenter.end(&cx, &current, Some(&response), Some(&error));
                            return Err(error);
                        }
                    }
                }
                Err(error) => {
                    instrumenter.end(&cx, &current, None, Some(&error));
                    return Err(error);
                }
            }
        }
    }
}
