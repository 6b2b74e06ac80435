// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Request router.

Every request is a route name plus a JSON object of PascalCase parameters.
The router looks the route up, applies the [`HandlerContext`] (replayed
requests get their `SimulationID` rewritten), rejects requests aimed at a busy
simulation unless the route permits it, and runs the handler. The response is
the handler's body with `StatusCode` added; a failed request carries only its
status code.

```text
handle(route, params)
  │
  ├─ unknown route ────────────────────────▶ {StatusCode: 2}
  ├─ rewrite SimulationID (replay only)
  ├─ busy? (unless permit_busy) ───────────▶ {StatusCode: 3}
  └─ handler ─ Ok(body) ───────────────────▶ {StatusCode: 0, ..body}
             └ Err(e) ─────────────────────▶ {StatusCode: e.status_code()}
```
*/

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use nes_config::NesConfig;
use nes_npu_sim_engine::SimulationId;
use nes_state_manager::SavedRequest;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, trace, warn};

use crate::handlers;
use crate::manager_tasks::ManagerTaskSystem;
use crate::registry::SimulationRegistry;
use crate::types::{ServiceError, ServiceResult, StatusCode};

pub type HandlerFn = fn(&RequestRouter, &Request<'_>) -> ServiceResult<Value>;

/// Static description of one route
#[derive(Clone, Copy)]
pub struct Route {
    pub path: &'static str,
    pub handler: HandlerFn,
    /// Served even while the simulation is busy
    pub permit_busy: bool,
    /// Appended to the simulation's request log on success
    pub logged: bool,
}

impl Route {
    /// A request that changes the simulation and is replayed on load
    pub const fn mutating(path: &'static str, handler: HandlerFn) -> Self {
        Self {
            path,
            handler,
            permit_busy: false,
            logged: true,
        }
    }

    /// A request that is not part of the saved log
    pub const fn unlogged(path: &'static str, handler: HandlerFn) -> Self {
        Self {
            path,
            handler,
            permit_busy: false,
            logged: false,
        }
    }

    pub const fn permit_busy(mut self) -> Self {
        self.permit_busy = true;
        self
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("permit_busy", &self.permit_busy)
            .field("logged", &self.logged)
            .finish()
    }
}

/// Who is issuing a request
///
/// Client requests use the default context. A loading task replays with its
/// own task ID and the ID of the simulation it is rebuilding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandlerContext {
    pub task_id: Option<u64>,
    pub replace_simulation_id: Option<SimulationId>,
}

impl HandlerContext {
    pub fn replay(task_id: u64, simulation_id: SimulationId) -> Self {
        Self {
            task_id: Some(task_id),
            replace_simulation_id: Some(simulation_id),
        }
    }

    pub fn is_replay(&self) -> bool {
        self.task_id.is_some()
    }
}

/// A request as seen by a handler
pub struct Request<'a> {
    pub route: &'static str,
    pub params: &'a Value,
    pub context: &'a HandlerContext,
    logged: bool,
}

impl Request<'_> {
    /// Parse the parameters into a typed DTO.
    pub fn parse<T: DeserializeOwned>(&self) -> ServiceResult<T> {
        T::deserialize(self.params).map_err(|e| {
            ServiceError::InvalidParameters(format!("{}: {}", self.route, e))
        })
    }

    /// The request log entry for this request, if the route is logged
    pub fn log_entry(&self) -> Option<SavedRequest> {
        self.logged.then(|| SavedRequest {
            route: self.route.to_string(),
            params: self.params.clone(),
        })
    }
}

/// Router-wide settings taken from [`NesConfig`]
#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub save_dir: PathBuf,
    pub default_seed: u64,
    pub replay_poll_interval: Duration,
}

impl From<&NesConfig> for RouterSettings {
    fn from(config: &NesConfig) -> Self {
        Self {
            save_dir: config.persistence.save_dir.clone(),
            default_seed: config.simulation.default_seed,
            replay_poll_interval: config.manager_tasks.replay_poll_interval(),
        }
    }
}

/// Entry point for every request; cheap to clone
#[derive(Clone)]
pub struct RequestRouter {
    registry: Arc<SimulationRegistry>,
    tasks: Arc<ManagerTaskSystem>,
    settings: Arc<RouterSettings>,
    routes: Arc<AHashMap<&'static str, Route>>,
}

impl RequestRouter {
    pub fn new(config: &NesConfig) -> Self {
        let registry = Arc::new(SimulationRegistry::new(config.simulation.clone()));
        Self::with_registry(registry, config)
    }

    /// Router over an existing registry, e.g. one with a renderer attached
    pub fn with_registry(registry: Arc<SimulationRegistry>, config: &NesConfig) -> Self {
        let routes = handlers::routes()
            .into_iter()
            .map(|route| (route.path, route))
            .collect();
        Self {
            registry,
            tasks: Arc::new(ManagerTaskSystem::new()),
            settings: Arc::new(RouterSettings::from(config)),
            routes: Arc::new(routes),
        }
    }

    pub fn registry(&self) -> &Arc<SimulationRegistry> {
        &self.registry
    }

    pub fn tasks(&self) -> &Arc<ManagerTaskSystem> {
        &self.tasks
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    pub fn route(&self, path: &str) -> Option<&Route> {
        self.routes.get(path)
    }

    /// Every route path, sorted
    pub fn route_paths(&self) -> Vec<&'static str> {
        let mut paths: Vec<&'static str> = self.routes.keys().copied().collect();
        paths.sort_unstable();
        paths
    }

    /// Serve a client request.
    pub fn handle(&self, route: &str, params: &Value) -> Value {
        self.handle_with_context(route, params, &HandlerContext::default())
    }

    pub fn handle_with_context(
        &self,
        route: &str,
        params: &Value,
        context: &HandlerContext,
    ) -> Value {
        match self.dispatch(route, params, context) {
            Ok(body) => with_status(body, StatusCode::Success),
            Err(e) => {
                match e.status_code() {
                    StatusCode::SimulationBusy => {
                        debug!(target: "nes-services", "{}: {}", route, e)
                    }
                    _ => warn!(target: "nes-services", "{}: {}", route, e),
                }
                with_status(Value::Object(Map::new()), e.status_code())
            }
        }
    }

    /// Run a request and return its body, or the error it failed with.
    pub fn dispatch(
        &self,
        route: &str,
        params: &Value,
        context: &HandlerContext,
    ) -> ServiceResult<Value> {
        let route = *self
            .routes
            .get(route)
            .ok_or_else(|| ServiceError::UnknownRoute(route.to_string()))?;

        if !params.is_object() {
            return Err(ServiceError::invalid(format!(
                "{}: parameters must be a JSON object",
                route.path
            )));
        }
        let params = rewrite_simulation_id(params, context);

        if !route.permit_busy {
            self.reject_if_busy(&params)?;
        }

        trace!(target: "nes-services", "{} {}", route.path, params);
        let request = Request {
            route: route.path,
            params: &params,
            context,
            logged: route.logged,
        };
        (route.handler)(self, &request)
    }

    fn reject_if_busy(&self, params: &Value) -> ServiceResult<()> {
        let id = params
            .get("SimulationID")
            .and_then(Value::as_u64)
            .and_then(|id| u32::try_from(id).ok());
        if let Some(id) = id {
            // An invalid ID is left for the handler to report
            if let Ok(handle) = self.registry.get(SimulationId(id)) {
                if handle.is_busy() {
                    return Err(ServiceError::SimulationBusy);
                }
            }
        }
        Ok(())
    }

    /// Wait for manager tasks, then stop every simulation worker.
    pub fn shutdown(&self) {
        self.tasks.shutdown();
        self.registry.shutdown();
    }
}

fn rewrite_simulation_id<'a>(params: &'a Value, context: &HandlerContext) -> Cow<'a, Value> {
    match context.replace_simulation_id {
        Some(id) if params.get("SimulationID").is_some() => {
            let mut rewritten = params.clone();
            rewritten["SimulationID"] = json!(id.0);
            Cow::Owned(rewritten)
        }
        _ => Cow::Borrowed(params),
    }
}

fn with_status(body: Value, status: StatusCode) -> Value {
    let mut object = match body {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("Result".to_string(), other);
            map
        }
    };
    object.insert("StatusCode".to_string(), json!(status.as_u8()));
    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_only_touches_existing_simulation_id() {
        let context = HandlerContext::replay(4, SimulationId(9));
        let with_id = json!({ "SimulationID": 0, "Radius_um": 1.0 });
        assert_eq!(
            rewrite_simulation_id(&with_id, &context).into_owned(),
            json!({ "SimulationID": 9, "Radius_um": 1.0 })
        );

        let without_id = json!({ "Name": "n" });
        assert!(matches!(
            rewrite_simulation_id(&without_id, &context),
            Cow::Borrowed(_)
        ));
        assert!(matches!(
            rewrite_simulation_id(&with_id, &HandlerContext::default()),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn test_with_status_merges_into_body() {
        assert_eq!(
            with_status(json!({ "ShapeID": 3 }), StatusCode::Success),
            json!({ "ShapeID": 3, "StatusCode": 0 })
        );
        assert_eq!(
            with_status(Value::Null, StatusCode::SimulationBusy),
            json!({ "StatusCode": 3 })
        );
    }

    #[test]
    fn test_unknown_route_and_non_object_params() {
        let router = RequestRouter::new(&NesConfig::default());
        assert_eq!(
            router.handle("Simulation/Teleport", &json!({})),
            json!({ "StatusCode": 2 })
        );
        assert_eq!(
            router.handle("Simulation/Create", &json!(["T1"])),
            json!({ "StatusCode": 2 })
        );
    }

    #[test]
    fn test_route_table_flags() {
        let router = RequestRouter::new(&NesConfig::default());
        let status = router.route("Simulation/GetStatus").unwrap();
        assert!(status.permit_busy);
        assert!(!status.logged);
        let run_for = router.route("Simulation/RunFor").unwrap();
        assert!(!run_for.permit_busy);
        assert!(run_for.logged);
        assert!(router.route("ManTaskStatus").unwrap().permit_busy);
        assert!(!router.route("Simulation/Save").unwrap().logged);
    }
}
