use std::sync::Arc;

use multistep_register::config::AppConfig;
use multistep_register::logging::init_logging;
use multistep_register::store::LibSqlBackend;
use multistep_register::wizard::{
    RegisterRouteState, WizardController, register_routes, spawn_purge_task,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    let _logging = init_logging(&config)?;

    let addr = config.socket_addr();
    eprintln!("📝 Multistep Register v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   API: http://{}/api/register/sessions", addr);
    eprintln!("   Session TTL: {} min", config.session_ttl.as_secs() / 60);
    if let Some(dir) = &config.log_dir {
        eprintln!("   Logs: {}", dir.display());
    }

    // ── Database ─────────────────────────────────────────────────────────
    let db = Arc::new(LibSqlBackend::new_local(&config.db_path).await.map_err(|e| {
        anyhow::anyhow!("Failed to open database at {}: {}", config.db_path.display(), e)
    })?);

    // ── Wizard ───────────────────────────────────────────────────────────
    let controller = WizardController::new(db.clone()).with_record_store(db.clone());
    let state = RegisterRouteState {
        controller: Arc::new(controller),
        sessions: db.clone(),
    };
    let _purge_handle = spawn_purge_task(db, config.session_ttl);
    let app = register_routes(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Registration API listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
