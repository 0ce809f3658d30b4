use arbiter::config::Config;
use arbiter::supervisor;

fn main() {
    env_logger::init();

    let config = Config::from_env();
    if let Err(err) = supervisor::run(&config) {
        eprintln!("arbiter: fatal: {err}");
        std::process::exit(1);
    }
}
