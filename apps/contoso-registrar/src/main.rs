//! Contoso Registrar
//!
//! Opens the database, optionally seeds demo data and logs the first page of
//! each listing.

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use contoso_registrar::db::{self, DepartmentRepository, InstructorRepository, StudentRepository};
use contoso_registrar::{list_students, seed, Config, DepartmentService, StudentListRequest};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "contoso_registrar=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("invalid configuration")?;

    tracing::info!("Starting Contoso Registrar v{}", env!("CARGO_PKG_VERSION"));

    let pool = db::create_pool(&config.database)
        .await
        .context("failed to initialize database")?;
    tracing::info!("Database initialized at {}", config.database.url);

    if config.seed_demo_data {
        seed::seed_demo_data(&pool)
            .await
            .context("failed to seed demo data")?;
    }

    let departments = DepartmentService::new(
        DepartmentRepository::new(&pool),
        InstructorRepository::new(&pool),
        config.display.clone(),
    );
    let page = departments
        .page(None, config.paging.departments_page_size)
        .await
        .context("failed to list departments")?;
    tracing::info!(
        total = page.total_count(),
        pages = page.total_pages(),
        "Departments"
    );
    for summary in page.items() {
        tracing::info!(
            id = summary.department.id,
            budget = %summary.department.budget.format(&config.display.currency_symbol),
            administrator = summary.administrator.as_deref().unwrap_or(""),
            "{}",
            summary.department.name
        );
    }

    let students = StudentRepository::new(&pool);
    let view = list_students(
        &students,
        &StudentListRequest::default(),
        config.paging.students_page_size,
    )
    .await
    .context("failed to list students")?;
    tracing::debug!("Students: {}", serde_json::to_string(&view)?);
    tracing::info!(
        total = view.students.total_count(),
        pages = view.students.total_pages(),
        has_next = view.students.has_next(),
        "Students"
    );

    pool.close().await;
    Ok(())
}
