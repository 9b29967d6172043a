use log::error;
use microblog::config::Config;
use std::process;

fn main() {
    let config = Config::from_env().expect("Failed to read configuration");
    let app = microblog::rocket(config).expect("Failed to create database pool");
    if let Err(e) = rocket::execute(app.launch()) {
        error!("launch failed: {}", e);
        process::exit(1);
    }
}
