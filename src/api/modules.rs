//! Module registry, initialization and routing endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::{parse_address, parse_hex, to_hex, tx_from, AppState};
use crate::platform::orchestrator::ModuleLifecycle;
use crate::platform::registry::{ImplementationInfo, ModuleRecord};
use crate::platform::{Platform, TxContext};
use crate::types::{Address, ApiError, ApiResult};

#[derive(Debug, Serialize)]
pub struct ModuleView {
    pub id: String,
    pub address: Address,
    pub implementation: Option<String>,
    pub dependencies: Vec<String>,
    pub active: bool,
    pub initialized: bool,
    pub lifecycle: ModuleLifecycle,
    pub version: u32,
    pub registered_at: u64,
}

impl ModuleView {
    fn from_record(platform: &Platform, record: ModuleRecord) -> Self {
        let implementation = platform
            .implementations()
            .into_iter()
            .find(|info| info.address == record.address)
            .map(|info| info.name);
        Self {
            lifecycle: platform.get_module_lifecycle(&record.id),
            implementation,
            id: record.id,
            address: record.address,
            dependencies: record.dependencies,
            active: record.active,
            initialized: record.initialized,
            version: record.version,
            registered_at: record.registered_at,
        }
    }

    fn load(platform: &Platform, id: &str) -> ApiResult<Self> {
        let record = platform.get_module_info(id)?;
        Ok(Self::from_record(platform, record))
    }
}

#[derive(Debug, Serialize)]
pub struct ModuleListResponse {
    pub modules: Vec<ModuleView>,
    pub total: usize,
    pub active: usize,
}

#[derive(Debug, Serialize)]
pub struct ImplementationListResponse {
    pub implementations: Vec<ImplementationInfo>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterModuleRequest {
    pub caller: String,
    pub id: String,
    pub address: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DependenciesResponse {
    pub module_id: String,
    pub dependencies: Vec<String>,
}

/// Body for admin actions that carry nothing but the caller.
#[derive(Debug, Deserialize)]
pub struct CallerRequest {
    pub caller: String,
}

#[derive(Debug, Deserialize)]
pub struct UpgradeRequest {
    pub caller: String,
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct InitializeRequest {
    pub caller: String,
    /// Hex setup payload; omitted means empty
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Serialize)]
pub struct InitializeResponse {
    pub module_id: String,
    pub success: bool,
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct BatchInitializeRequest {
    pub caller: String,
    pub ids: Vec<String>,
    pub data: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchEntry {
    pub module_id: String,
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct BatchInitializeResponse {
    pub results: Vec<BatchEntry>,
    pub succeeded: usize,
    pub failed: usize,
    /// Ids to retry individually
    pub retry: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchStatusRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchStatusEntry {
    pub module_id: String,
    pub active: bool,
}

#[derive(Debug, Serialize)]
pub struct BatchStatusResponse {
    pub statuses: Vec<BatchStatusEntry>,
}

#[derive(Debug, Deserialize)]
pub struct CallRequest {
    pub caller: String,
    #[serde(default)]
    pub data: String,
    /// Attached native value, smallest unit
    pub value: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StaticCallRequest {
    /// Defaults to the zero address
    pub caller: Option<String>,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Serialize)]
pub struct CallResponse {
    pub module_id: String,
    pub output: String,
}

/// GET /api/implementations - List deployed module implementations
pub async fn list_implementations(
    State(state): State<AppState>,
) -> ApiResult<Json<ImplementationListResponse>> {
    let platform = state.platform.read().await;
    Ok(Json(ImplementationListResponse {
        implementations: platform.implementations(),
    }))
}

/// GET /api/modules - List modules in registration order
pub async fn list_modules(State(state): State<AppState>) -> ApiResult<Json<ModuleListResponse>> {
    let platform = state.platform.read().await;
    let modules: Vec<ModuleView> = platform
        .module_records()
        .into_iter()
        .map(|record| ModuleView::from_record(&platform, record))
        .collect();
    let active = modules.iter().filter(|m| m.active).count();

    Ok(Json(ModuleListResponse {
        total: modules.len(),
        active,
        modules,
    }))
}

/// POST /api/modules - Register a module id against a deployed implementation
pub async fn register_module(
    State(state): State<AppState>,
    Json(req): Json<RegisterModuleRequest>,
) -> ApiResult<Json<ModuleView>> {
    let tx = tx_from(&req.caller, None)?;
    let address = parse_address(&req.address, "address")?;

    let mut platform = state.platform.write().await;
    platform.register_module(&tx, &req.id, address, &req.dependencies)?;
    tracing::info!("Registered module {} at {}", req.id, address);
    ModuleView::load(&platform, &req.id).map(Json)
}

/// GET /api/modules/:id - Module record and lifecycle state
pub async fn get_module(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ModuleView>> {
    let platform = state.platform.read().await;
    ModuleView::load(&platform, &id).map(Json)
}

/// GET /api/modules/:id/dependencies
pub async fn get_dependencies(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DependenciesResponse>> {
    let platform = state.platform.read().await;
    let dependencies = platform.get_module_dependencies(&id)?;
    Ok(Json(DependenciesResponse {
        module_id: id,
        dependencies,
    }))
}

/// POST /api/modules/:id/deactivate
pub async fn deactivate_module(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CallerRequest>,
) -> ApiResult<Json<ModuleView>> {
    let tx = tx_from(&req.caller, None)?;
    let mut platform = state.platform.write().await;
    platform.deactivate_module(&tx, &id)?;
    ModuleView::load(&platform, &id).map(Json)
}

/// POST /api/modules/:id/reactivate
pub async fn reactivate_module(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CallerRequest>,
) -> ApiResult<Json<ModuleView>> {
    let tx = tx_from(&req.caller, None)?;
    let mut platform = state.platform.write().await;
    platform.reactivate_module(&tx, &id)?;
    ModuleView::load(&platform, &id).map(Json)
}

/// POST /api/modules/:id/upgrade - Point the module at another implementation
pub async fn upgrade_module(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpgradeRequest>,
) -> ApiResult<Json<ModuleView>> {
    let tx = tx_from(&req.caller, None)?;
    let address = parse_address(&req.address, "address")?;
    let mut platform = state.platform.write().await;
    platform.upgrade_module(&tx, &id, address)?;
    ModuleView::load(&platform, &id).map(Json)
}

/// POST /api/modules/:id/initialize
pub async fn initialize_module(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<InitializeRequest>,
) -> ApiResult<Json<InitializeResponse>> {
    let tx = tx_from(&req.caller, None)?;
    let data = parse_hex(&req.data, "data")?;

    let mut platform = state.platform.write().await;
    let success = platform.initialize_module(&tx, &id, &data)?;
    Ok(Json(InitializeResponse {
        active: platform.module_active(&id),
        module_id: id,
        success,
    }))
}

/// POST /api/batch/initialize - Initialize several modules, isolating failures
pub async fn initialize_batch(
    State(state): State<AppState>,
    Json(req): Json<BatchInitializeRequest>,
) -> ApiResult<Json<BatchInitializeResponse>> {
    let tx = tx_from(&req.caller, None)?;
    let payloads = req
        .data
        .iter()
        .enumerate()
        .map(|(i, raw)| parse_hex(raw, &format!("data[{}]", i)))
        .collect::<ApiResult<Vec<_>>>()?;

    let mut platform = state.platform.write().await;
    let outcome = platform.initialize_modules_batch(&tx, &req.ids, &payloads)?;
    drop(platform);

    let results: Vec<BatchEntry> = req
        .ids
        .into_iter()
        .zip(outcome)
        .map(|(module_id, success)| BatchEntry { module_id, success })
        .collect();
    let succeeded = results.iter().filter(|r| r.success).count();
    let retry = results
        .iter()
        .filter(|r| !r.success)
        .map(|r| r.module_id.clone())
        .collect::<Vec<_>>();

    Ok(Json(BatchInitializeResponse {
        failed: results.len() - succeeded,
        succeeded,
        retry,
        results,
    }))
}

/// POST /api/batch/status - Active flag per id
pub async fn batch_status(
    State(state): State<AppState>,
    Json(req): Json<BatchStatusRequest>,
) -> ApiResult<Json<BatchStatusResponse>> {
    let platform = state.platform.read().await;
    let flags = platform.get_modules_initialization_status(&req.ids);
    let statuses = req
        .ids
        .into_iter()
        .zip(flags)
        .map(|(module_id, active)| BatchStatusEntry { module_id, active })
        .collect();
    Ok(Json(BatchStatusResponse { statuses }))
}

/// POST /api/modules/:id/call - State-changing routed call
pub async fn call_module(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CallRequest>,
) -> ApiResult<Json<CallResponse>> {
    let tx = tx_from(&req.caller, req.value.as_deref())?;
    let data = parse_hex(&req.data, "data")?;

    let output = state.platform.write().await.call_module(&tx, &id, &data)?;
    Ok(Json(CallResponse {
        module_id: id,
        output: to_hex(&output),
    }))
}

/// POST /api/modules/:id/static-call - Read-only routed call
pub async fn static_call_module(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<StaticCallRequest>,
) -> ApiResult<Json<CallResponse>> {
    let tx = match req.caller.as_deref() {
        Some(caller) => tx_from(caller, None)?,
        None => TxContext::new(Address::ZERO),
    };
    let data = parse_hex(&req.data, "data")?;

    let output = state
        .platform
        .read()
        .await
        .static_call_module(&tx, &id, &data)
        .map_err(ApiError::from)?;
    Ok(Json(CallResponse {
        module_id: id,
        output: to_hex(&output),
    }))
}
