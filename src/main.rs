// ==========================================
// 参数化数据导入 - 命令行入口
// ==========================================
// 用法:
//   parameterized-import <db_path> <table_dir> <scope>
//
// 选区与配置预先写入 db_path；表文件按 <table_dir>/<表名>.csv|.xlsx|.xls 解析
// ==========================================

use parameterized_import::api::ImportApi;
use parameterized_import::logging;

const USAGE: &str = "用法: parameterized-import <db_path> <table_dir> <scope>";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let mut args = std::env::args().skip(1);
    let (db_path, table_dir, scope) = match (args.next(), args.next(), args.next()) {
        (Some(db), Some(dir), Some(scope)) => (db, dir, scope),
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };

    tracing::info!("==================================================");
    tracing::info!("{} v{}", parameterized_import::APP_NAME, parameterized_import::VERSION);
    tracing::info!(db_path = %db_path, table_dir = %table_dir, scope = %scope, "开始导入");
    tracing::info!("==================================================");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let api = ImportApi::new(db_path, table_dir);
    let response = runtime.block_on(api.run_import(&scope))?;

    println!("report_id={}", response.report_id);
    println!("series_created={}", response.series_created.len());
    for name in &response.series_created {
        println!("  + {}", name);
    }
    println!("series_skipped={}", response.series_skipped.len());
    for skipped in &response.series_skipped {
        println!("  - {}: {}", skipped.name, skipped.reason);
    }
    if !response.unclassified_ranges.is_empty() {
        println!("unclassified_ranges={}", response.unclassified_ranges.join(", "));
    }
    println!("research_updated={}", response.research_updated);
    println!("records_written={}", response.records_written);
    println!("elapsed_ms={}", response.elapsed_ms);

    if let Some(err) = response.fatal_error {
        eprintln!("导入失败: {}", err);
        std::process::exit(1);
    }
    Ok(())
}
