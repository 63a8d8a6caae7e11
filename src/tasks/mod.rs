pub mod warmup_loop;
