//! 라이브 테이블 마이그레이션 CLI.
//!
//! - `serve`: HTTP 제어 서버와 수정 소비자를 함께 실행
//! - `validate`: 전체 검증 1회 실행 후 발견한 불일치를 수정

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{http::StatusCode, Router};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use migrator_api::{create_api_router, AppState, MigratorConfig, FIX_CONSUMER_GROUP};
use migrator_core::{Direction, RowRecord, Store};
use migrator_data::connect_store;
use migrator_engine::{DualWritePool, FixConsumer, Fixer, MemoryTopic, Scheduler, Validator};
use tokio_util::sync::CancellationToken;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 불일치 이벤트 토픽 이름
const TOPIC_NAME: &str = "migrator.inconsistency";

#[derive(Parser)]
#[command(name = "migrator")]
#[command(about = "Live zero-downtime table migration", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// HTTP 제어 서버와 수정 소비자 실행
    Serve,

    /// 전체 검증 1회 실행 후 수정
    Validate {
        /// 이 시각 이후 수정된 행만 검증 (RFC 3339, 예: 2024-01-01T00:00:00Z)
        #[arg(long)]
        since: Option<DateTime<Utc>>,

        /// 수정 없이 검증 결과만 출력
        #[arg(long)]
        dry_run: bool,
    },
}

/// 소스 / 목적지 저장소
struct Stores {
    src: Arc<dyn Store>,
    dst: Arc<dyn Store>,
}

async fn connect_stores(config: &MigratorConfig) -> anyhow::Result<Stores> {
    let src = connect_store(&config.src)
        .await
        .with_context(|| format!("소스 연결 실패: {}", config.src.masked_url()))?;
    let dst = connect_store(&config.dst)
        .await
        .with_context(|| format!("목적지 연결 실패: {}", config.dst.masked_url()))?;
    Ok(Stores {
        src: Arc::new(src),
        dst: Arc::new(dst),
    })
}

/// 방향별 수정기를 가진 소비자 생성
async fn build_fix_consumer(
    config: &MigratorConfig,
    stores: &Stores,
    topic: &Arc<MemoryTopic>,
) -> anyhow::Result<FixConsumer> {
    let src_fixer = Fixer::new(
        stores.src.clone(),
        stores.dst.clone(),
        config.table.clone(),
        config.dialect,
    )
    .await?;
    let dst_fixer = Fixer::new(
        stores.dst.clone(),
        stores.src.clone(),
        config.table.clone(),
        config.dialect,
    )
    .await?;

    Ok(FixConsumer::new(
        Arc::new(topic.subscribe(FIX_CONSUMER_GROUP).await),
        Arc::new(src_fixer),
        Arc::new(dst_fixer),
    )
    .with_retry(config.retry_config())
    .with_redelivery_backoff(config.redelivery_backoff()))
}

/// 전체 라우터 생성.
fn create_router(state: Arc<AppState>) -> Router {
    create_api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // 전역 타임아웃 (30초) - 408 상태 코드 반환
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
}

async fn serve(config: MigratorConfig, stores: Stores) -> anyhow::Result<()> {
    let pool = Arc::new(DualWritePool::new(
        stores.src.clone(),
        stores.dst.clone(),
        config.initial_phase,
    ));
    let topic = MemoryTopic::new(TOPIC_NAME);
    let scheduler = Arc::new(
        Scheduler::<RowRecord>::new(pool, topic.clone(), config.table.clone(), config.dialect)?
            .with_config(config.scheduler_config()),
    );

    let shutdown = CancellationToken::new();
    let consumer = build_fix_consumer(&config, &stores, &topic).await?;
    let consumer_handle = tokio::spawn(consumer.run(shutdown.clone()));

    let app = create_router(Arc::new(AppState::new(scheduler.clone(), topic.clone())));
    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("{} 바인딩 실패", addr))?;
    info!(addr = %addr, phase = %config.initial_phase, "제어 서버 시작");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    info!("서버 종료, 정리 중");
    scheduler.shutdown().await;
    shutdown.cancel();

    match tokio::time::timeout(Duration::from_secs(10), consumer_handle).await {
        Ok(Ok(stats)) => stats.log_summary("serve"),
        Ok(Err(e)) => warn!(error = %e, "수정 소비자 태스크 비정상 종료"),
        Err(_) => warn!("수정 소비자 종료 대기 시간 초과"),
    }

    info!("서버 정상 종료");
    Ok(())
}

async fn validate(
    config: MigratorConfig,
    stores: Stores,
    since: Option<DateTime<Utc>>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let direction = config.initial_phase.authoritative();
    let (base, target) = match direction {
        Direction::Src => (stores.src.clone(), stores.dst.clone()),
        Direction::Dst => (stores.dst.clone(), stores.src.clone()),
    };
    let utime = since.map(|t| t.timestamp_millis()).unwrap_or(0);

    let topic = MemoryTopic::new(TOPIC_NAME);
    let validator = Validator::<RowRecord>::new(
        base,
        target,
        direction,
        config.table.clone(),
        config.dialect,
        topic.clone(),
    )
    .with_batch_size(config.validation.batch_size)
    .with_utime(utime);

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(shutdown_signal(cancel.clone()));

    let stats = validator.validate(&cancel).await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    if dry_run || cancel.is_cancelled() {
        watcher.abort();
        return Ok(());
    }

    // 발행이 끝났으므로 닫아서 소비자가 남은 이벤트만 처리하고 끝나도록 함.
    // 수정에 실패한 이벤트는 성공하거나 종료 시그널을 받을 때까지 재처리.
    topic.close().await;
    let consumer = build_fix_consumer(&config, &stores, &topic).await?;
    let fix_stats = consumer.run(cancel.clone()).await;
    println!("{}", serde_json::to_string_pretty(&fix_stats)?);

    watcher.abort();
    Ok(())
}

/// 종료 시그널 대기 후 토큰 취소.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C 핸들러 설치 실패");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM 핸들러 설치 실패");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => warn!("Ctrl+C 수신, 종료 시작"),
        _ = terminate => warn!("SIGTERM 수신, 종료 시작"),
        _ = shutdown_token.cancelled() => {}
    }

    shutdown_token.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "migrator={lvl},migrator_api={lvl},migrator_engine={lvl},migrator_data={lvl},tower_http={lvl}",
                    lvl = cli.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MigratorConfig::from_env()?;
    info!(
        src = %config.src.masked_url(),
        dst = %config.dst.masked_url(),
        table = %config.table.name(),
        dialect = %config.dialect,
        phase = %config.initial_phase,
        "설정 로드 완료"
    );

    let stores = connect_stores(&config).await?;

    match cli.command {
        Commands::Serve => serve(config, stores).await,
        Commands::Validate { since, dry_run } => validate(config, stores, since, dry_run).await,
    }
}
