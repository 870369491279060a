pub mod postgres_key_word_repository;
pub mod postgres_task_main_repository;
pub mod postgres_task_run_repository;

pub use postgres_key_word_repository::PostgresKeyWordRepository;
pub use postgres_task_main_repository::PostgresTaskMainRepository;
pub use postgres_task_run_repository::PostgresTaskRunRepository;
