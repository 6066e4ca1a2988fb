use crate::config::Route;

/// One planned probe: a backend origin paired with a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target<'a> {
    pub backend: &'a str,
    pub route: &'a Route,
}

impl Target<'_> {
    /// Full URL of the probed endpoint.
    pub fn url(&self) -> String {
        format!("{}{}", self.backend.trim_end_matches('/'), self.route.path)
    }
}

/// Build the ordered probe list for one iteration.
///
/// The route list is rotated cyclically so that the route at position
/// `run % routes.len()` is probed first; backends keep their original order
/// within every route. Over `routes.len()` consecutive runs each route
/// leads exactly once. Backends are never rotated: cold-start behavior is
/// route-sensitive per backend, while backend comparison wants a fixed
/// relative ordering.
pub fn plan<'a>(run: u64, routes: &'a [Route], backends: &'a [String]) -> Vec<Target<'a>> {
    if routes.is_empty() {
        return Vec::new();
    }

    let start = (run % routes.len() as u64) as usize;
    let mut targets = Vec::with_capacity(routes.len() * backends.len());

    for route in routes[start..].iter().chain(routes[..start].iter()) {
        for backend in backends {
            targets.push(Target { backend, route });
        }
    }

    targets
}
