pub mod run_stats;
