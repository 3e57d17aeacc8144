use std::sync::Mutex;

use opentelemetry::trace::TraceContextExt;
use opentelemetry::{Context, KeyValue};
use opentelemetry_semantic_conventions::attribute;

use crate::semconv;

/// Where a route candidate came from. Sources closer to the application
/// know the route better; a later update wins only when its source
/// outranks the one that set the current route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpServerRouteSource {
    /// The server layer itself (e.g. a servlet container mapping).
    Server,
    /// A filter or middleware running before dispatch. Nested filters may
    /// refine each other's routes, so later same-rank updates win.
    ServerFilter,
    /// The controller/handler the request was dispatched to.
    Controller,
    /// A controller nested inside another one; later same-rank updates win.
    NestedController,
}

impl HttpServerRouteSource {
    fn order(&self) -> u8 {
        match self {
            HttpServerRouteSource::Server => 1,
            HttpServerRouteSource::ServerFilter => 2,
            HttpServerRouteSource::Controller => 3,
            HttpServerRouteSource::NestedController => 4,
        }
    }

    /// Whether the first update from this rank wins over later ones.
    fn use_first(&self) -> bool {
        match self {
            HttpServerRouteSource::Server | HttpServerRouteSource::Controller => true,
            HttpServerRouteSource::ServerFilter | HttpServerRouteSource::NestedController => false,
        }
    }
}

#[derive(Debug)]
struct RouteState {
    method: String,
    inner: Mutex<RouteStateInner>,
}

#[derive(Debug, Default)]
struct RouteStateInner {
    updated_by_order: u8,
    route: Option<String>,
}

/// A context holder for the best-effort `http.route` of a server operation.
///
/// The route is rarely known when the span starts; servlet mappings,
/// routers and controllers resolve it at different points of request
/// processing. Each layer reports its candidate through
/// [`update`](HttpServerRoute::update); the holder applies the source
/// precedence rules and renames the span to `{method} {route}` when a
/// candidate is accepted. The server attributes extractor reads the final
/// value at operation end.
#[derive(Debug)]
pub struct HttpServerRoute;

impl HttpServerRoute {
    /// Returns the context customizer that installs the holder; register it
    /// on the server instrumenter builder.
    pub fn customizer<REQUEST>(
    ) -> impl Fn(Context, &REQUEST, &[KeyValue]) -> Context + Send + Sync + 'static {
        |cx: Context, _request: &REQUEST, attributes: &[KeyValue]| {
            if cx.get::<RouteState>().is_some() {
                return cx;
            }
            let method = attributes
                .iter()
                .find(|kv| {
                    kv.key.as_str() == attribute::HTTP_REQUEST_METHOD
                        || kv.key.as_str() == semconv::HTTP_METHOD
                })
                .map(|kv| kv.value.as_str().into_owned())
                .unwrap_or_else(|| "HTTP".to_owned());
            cx.with_value(RouteState {
                method,
                inner: Mutex::new(RouteStateInner::default()),
            })
        }
    }

    /// Offers a route candidate from `source`. `route` is only evaluated
    /// when the precedence rules allow the update; a `None` result leaves
    /// the current route in place.
    pub fn update(
        cx: &Context,
        source: HttpServerRouteSource,
        route: impl FnOnce() -> Option<String>,
    ) {
        let Some(state) = cx.get::<RouteState>() else {
            return;
        };
        let Ok(mut inner) = state.inner.lock() else {
            return;
        };
        let allowed = if source.use_first() {
            inner.updated_by_order < source.order()
        } else {
            inner.updated_by_order <= source.order()
        };
        if !allowed {
            return;
        }
        let Some(route) = route() else { return };
        inner.updated_by_order = source.order();
        cx.span().update_name(format!("{} {route}", state.method));
        inner.route = Some(route);
    }

    /// The route resolved so far, if any.
    pub fn get(cx: &Context) -> Option<String> {
        let state = cx.get::<RouteState>()?;
        let inner = state.inner.lock().ok()?;
        inner.route.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_with_state(method: &str) -> Context {
        let customize = HttpServerRoute::customizer::<()>();
        customize(
            Context::new(),
            &(),
            &[KeyValue::new(attribute::HTTP_REQUEST_METHOD, method.to_owned())],
        )
    }

    #[test]
    fn higher_ranked_source_overrides() {
        let cx = context_with_state("GET");
        HttpServerRoute::update(&cx, HttpServerRouteSource::Server, || {
            Some("/*".to_owned())
        });
        HttpServerRoute::update(&cx, HttpServerRouteSource::Controller, || {
            Some("/users/{id}".to_owned())
        });
        assert_eq!(HttpServerRoute::get(&cx).as_deref(), Some("/users/{id}"));
    }

    #[test]
    fn first_update_wins_within_a_use_first_source() {
        let cx = context_with_state("GET");
        HttpServerRoute::update(&cx, HttpServerRouteSource::Controller, || {
            Some("/users/{id}".to_owned())
        });
        HttpServerRoute::update(&cx, HttpServerRouteSource::Controller, || {
            Some("/other".to_owned())
        });
        assert_eq!(HttpServerRoute::get(&cx).as_deref(), Some("/users/{id}"));
    }

    #[test]
    fn nested_sources_may_refine_their_own_rank() {
        let cx = context_with_state("GET");
        HttpServerRoute::update(&cx, HttpServerRouteSource::NestedController, || {
            Some("/outer".to_owned())
        });
        HttpServerRoute::update(&cx, HttpServerRouteSource::NestedController, || {
            Some("/outer/inner".to_owned())
        });
        assert_eq!(HttpServerRoute::get(&cx).as_deref(), Some("/outer/inner"));
    }

    #[test]
    fn lower_ranked_source_never_downgrades() {
        let cx = context_with_state("GET");
        HttpServerRoute::update(&cx, HttpServerRouteSource::Controller, || {
            Some("/users/{id}".to_owned())
        });
        HttpServerRoute::update(&cx, HttpServerRouteSource::Server, || {
            Some("/*".to_owned())
        });
        assert_eq!(HttpServerRoute::get(&cx).as_deref(), Some("/users/{id}"));
    }

    #[test]
    fn update_without_holder_is_a_no_op() {
        let cx = Context::new();
        HttpServerRoute::update(&cx, HttpServerRouteSource::Controller, || {
            Some("/users/{id}".to_owned())
        });
        assert_eq!(HttpServerRoute::get(&cx), None);
    }

    #[test]
    fn rejected_update_does_not_evaluate_the_route() {
        let cx = context_with_state("GET");
        HttpServerRoute::update(&cx, HttpServerRouteSource::Controller, || {
            Some("/users/{id}".to_owned())
        });
        HttpServerRoute::update(&cx, HttpServerRouteSource::Server, || {
            panic!("route closure must not run for an outranked source")
        });
    }
}
