use assert_cmd::Command;
use insta_cmd::get_cargo_bin;

pub fn detok_cmd() -> Command {
	let mut cmd = Command::new(get_cargo_bin("detok"));
	cmd.env("NO_COLOR", "1").env_remove("DETOK_LOG");
	cmd
}
