use std::process::Command;

fn main() {
    // Migrations are embedded via diesel_migrations::embed_migrations!().
    println!("cargo:rerun-if-changed=migrations/");

    // Embed the git hash in the executable, referenced with env!().
    let output = Command::new("git").args(["describe", "--always", "--dirty"]).output();
    let git_hash = match output {
        Ok(o) => String::from_utf8(o.stdout).unwrap(),
        Err(_) => "unknown".to_string(),
    };
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/master");
    println!("cargo:rustc-env=BUILD_TIME_GIT_HASH={git_hash}");
}
