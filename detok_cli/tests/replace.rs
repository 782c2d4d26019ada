mod common;

use detok_core::AnyEmptyResult;
use detok_core::encoding::TextEncoding;
use serde_json::Value;

#[test]
fn replace_rewrites_tokens_in_tree() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let root = tmp.path().join("dist");
	std::fs::create_dir_all(root.join("sub"))?;
	std::fs::write(root.join("a.txt"), "version=$(Version)\n")?;
	std::fs::write(root.join("sub/b.txt"), "env=$(Env)\n")?;

	common::detok_cmd()
		.current_dir(tmp.path())
		.arg("replace")
		.arg("--path")
		.arg(format!("{}/*", root.display()))
		.arg("--set")
		.arg("Version=1.2.3")
		.arg("--set")
		.arg("Env=staging")
		.assert()
		.success()
		.stdout(predicates::str::contains(
			"Processed 2 file(s), rewrote 2 file(s)",
		));

	assert_eq!(
		std::fs::read_to_string(root.join("a.txt"))?,
		"version=1.2.3\n"
	);
	assert_eq!(
		std::fs::read_to_string(root.join("sub/b.txt"))?,
		"env=staging\n"
	);

	Ok(())
}

#[test]
fn replace_flat_directory_skips_subdirectories() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::create_dir_all(tmp.path().join("sub"))?;
	std::fs::write(tmp.path().join("a.txt"), "$(Value)")?;
	std::fs::write(tmp.path().join("sub/b.txt"), "$(Value)")?;

	common::detok_cmd()
		.current_dir(tmp.path())
		.arg("replace")
		.arg("--path")
		.arg(tmp.path())
		.arg("--set")
		.arg("Value=x")
		.assert()
		.success()
		.stdout(predicates::str::contains(
			"Processed 1 file(s), rewrote 1 file(s)",
		));

	assert_eq!(std::fs::read_to_string(tmp.path().join("sub/b.txt"))?, "$(Value)");

	Ok(())
}

#[test]
fn replace_fails_on_missing_token() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let file = tmp.path().join("greeting.txt");
	std::fs::write(&file, "Hello $(Missing)!")?;

	common::detok_cmd()
		.current_dir(tmp.path())
		.arg("replace")
		.arg("--file")
		.arg(&file)
		.arg("--set")
		.arg("Name=World")
		.assert()
		.code(2)
		.stderr(predicates::str::contains("Missing"));

	assert_eq!(std::fs::read_to_string(&file)?, "Hello $(Missing)!");

	Ok(())
}

#[test]
fn replace_fails_on_missing_file() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	common::detok_cmd()
		.current_dir(tmp.path())
		.arg("replace")
		.arg("--file")
		.arg(tmp.path().join("missing.txt"))
		.arg("--set")
		.arg("Name=World")
		.assert()
		.code(2)
		.stderr(predicates::str::contains("file not found"));

	Ok(())
}

#[test]
fn replace_force_write_counts_unchanged_files() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("plain.txt"), "No tokens here")?;

	common::detok_cmd()
		.current_dir(tmp.path())
		.arg("replace")
		.arg("--path")
		.arg(tmp.path())
		.arg("--set")
		.arg("Name=World")
		.arg("--force-write")
		.assert()
		.success()
		.stdout(predicates::str::contains(
			"Processed 1 file(s), rewrote 1 file(s)",
		));

	assert_eq!(
		std::fs::read_to_string(tmp.path().join("plain.txt"))?,
		"No tokens here"
	);

	Ok(())
}

#[test]
fn replace_resolves_from_property_file() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let props = tmp.path().join("build.json");
	std::fs::write(&props, r#"{"app": {"url": "https://example.com"}}"#)?;
	let file = tmp.path().join("web.config");
	std::fs::write(&file, "<add key=\"url\" value=\"$(app.url)\" />")?;

	common::detok_cmd()
		.current_dir(tmp.path())
		.arg("replace")
		.arg("--file")
		.arg(&file)
		.arg("--properties")
		.arg(&props)
		.assert()
		.success();

	assert_eq!(
		std::fs::read_to_string(&file)?,
		"<add key=\"url\" value=\"https://example.com\" />"
	);

	Ok(())
}

#[test]
fn replace_resolves_from_environment() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let file = tmp.path().join("branch.txt");
	std::fs::write(&file, "branch=$(DETOK_TEST_BRANCH)")?;

	common::detok_cmd()
		.current_dir(tmp.path())
		.env("DETOK_TEST_BRANCH", "main")
		.arg("replace")
		.arg("--file")
		.arg(&file)
		.assert()
		.success();

	assert_eq!(std::fs::read_to_string(&file)?, "branch=main");

	Ok(())
}

#[test]
fn explicit_replacements_ignore_environment() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let file = tmp.path().join("branch.txt");
	std::fs::write(&file, "branch=$(DETOK_TEST_BRANCH)")?;

	common::detok_cmd()
		.current_dir(tmp.path())
		.env("DETOK_TEST_BRANCH", "main")
		.arg("replace")
		.arg("--file")
		.arg(&file)
		.arg("--set")
		.arg("Other=value")
		.arg("--env")
		.assert()
		.code(2)
		.stderr(predicates::str::contains("DETOK_TEST_BRANCH"));

	assert_eq!(std::fs::read_to_string(&file)?, "branch=$(DETOK_TEST_BRANCH)");

	Ok(())
}

#[test]
fn replace_writes_requested_encoding() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let file = tmp.path().join("app.config");
	std::fs::write(&file, "env=$(Env)")?;

	common::detok_cmd()
		.current_dir(tmp.path())
		.arg("replace")
		.arg("--file")
		.arg(&file)
		.arg("--set")
		.arg("Env=prod")
		.arg("--encoding")
		.arg("Unicode")
		.assert()
		.success();

	assert_eq!(std::fs::read(&file)?, TextEncoding::Utf16Le.encode("env=prod"));

	Ok(())
}

#[test]
fn unknown_encoding_fails_before_any_file_is_touched() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let file = tmp.path().join("app.config");
	std::fs::write(&file, "env=$(Env)")?;

	common::detok_cmd()
		.current_dir(tmp.path())
		.arg("replace")
		.arg("--file")
		.arg(&file)
		.arg("--set")
		.arg("Env=prod")
		.arg("--encoding")
		.arg("Klingon")
		.assert()
		.code(2)
		.stderr(predicates::str::contains("not a supported encoding name"));

	assert_eq!(std::fs::read_to_string(&file)?, "env=$(Env)");

	Ok(())
}

#[test]
fn invalid_pattern_is_rejected() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("a.txt"), "$(Value)")?;

	common::detok_cmd()
		.current_dir(tmp.path())
		.arg("replace")
		.arg("--path")
		.arg(tmp.path())
		.arg("--set")
		.arg("Value=x")
		.arg("--pattern")
		.arg(r"\$\([a-z]+\)")
		.assert()
		.code(2)
		.stderr(predicates::str::contains("invalid token pattern"));

	Ok(())
}

#[test]
fn custom_pattern_replaces_tokens() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let file = tmp.path().join("a.txt");
	std::fs::write(&file, "@@Value@@ $(Value)")?;

	common::detok_cmd()
		.current_dir(tmp.path())
		.arg("replace")
		.arg("--file")
		.arg(&file)
		.arg("--set")
		.arg("Value=x")
		.arg("--pattern")
		.arg("@@([A-Za-z]+)@@")
		.assert()
		.success();

	assert_eq!(std::fs::read_to_string(&file)?, "x $(Value)");

	Ok(())
}

#[test]
fn duplicate_set_keys_are_rejected() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let file = tmp.path().join("a.txt");
	std::fs::write(&file, "$(Value)")?;

	common::detok_cmd()
		.current_dir(tmp.path())
		.arg("replace")
		.arg("--file")
		.arg(&file)
		.arg("--set")
		.arg("Value=x")
		.arg("--set")
		.arg("Value=y")
		.assert()
		.code(2)
		.stderr(predicates::str::contains("duplicate replacement key"));

	assert_eq!(std::fs::read_to_string(&file)?, "$(Value)");

	Ok(())
}

#[test]
fn replace_uses_config_file() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(
		tmp.path().join("detok.toml"),
		"[replacements]\nVersion = \"2.0\"\nEnv = \"config\"\n\n[[files]]\npath = \"app.txt\"\n",
	)?;
	std::fs::write(tmp.path().join("app.txt"), "$(Version) $(Env)")?;

	common::detok_cmd()
		.current_dir(tmp.path())
		.arg("replace")
		.arg("--set")
		.arg("Env=cli")
		.assert()
		.success()
		.stdout(predicates::str::contains(
			"Processed 1 file(s), rewrote 1 file(s)",
		));

	assert_eq!(std::fs::read_to_string(tmp.path().join("app.txt"))?, "2.0 cli");

	Ok(())
}

#[test]
fn replace_requires_a_target() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	common::detok_cmd()
		.current_dir(tmp.path())
		.arg("replace")
		.arg("--set")
		.arg("Value=x")
		.assert()
		.code(2)
		.stderr(predicates::str::contains("no target files"));

	Ok(())
}

#[test]
fn replace_json_output() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("a.txt"), "$(Value)")?;
	std::fs::write(tmp.path().join("b.txt"), "plain")?;

	let output = common::detok_cmd()
		.current_dir(tmp.path())
		.arg("replace")
		.arg("--path")
		.arg(tmp.path())
		.arg("--set")
		.arg("Value=x")
		.arg("--format")
		.arg("json")
		.output()?;

	assert!(output.status.success());
	let json: Value = serde_json::from_slice(&output.stdout)?;
	assert_eq!(json["run_mode"], "replace");
	assert_eq!(json["mode"], "ExplicitMapping");
	assert_eq!(json["files_processed"], 2);
	assert_eq!(json["files_rewritten"], 1);
	assert_eq!(json["files"][0]["matched"], true);
	assert_eq!(json["files"][0]["write_encoding"], "UTF-8");
	assert_eq!(json["files"][1]["rewritten"], false);

	Ok(())
}

#[test]
fn replace_alias_detokenise() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let file = tmp.path().join("a.txt");
	std::fs::write(&file, "$(Value)")?;

	common::detok_cmd()
		.current_dir(tmp.path())
		.arg("detokenise")
		.arg("--file")
		.arg(&file)
		.arg("--set")
		.arg("Value=x")
		.assert()
		.success();

	assert_eq!(std::fs::read_to_string(&file)?, "x");

	Ok(())
}

#[test]
fn cli_property_files_take_precedence_over_config() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(
		tmp.path().join("detok.toml"),
		"[properties]\nfiles = [\"config.json\"]\n",
	)?;
	std::fs::write(
		tmp.path().join("config.json"),
		r#"{"Branch": "config", "Owner": "team"}"#,
	)?;
	std::fs::write(tmp.path().join("cli.json"), r#"{"Branch": "cli"}"#)?;
	let file = tmp.path().join("a.txt");
	std::fs::write(&file, "$(Branch) $(Owner)")?;

	common::detok_cmd()
		.current_dir(tmp.path())
		.arg("replace")
		.arg("--file")
		.arg(&file)
		.arg("--properties")
		.arg(tmp.path().join("cli.json"))
		.assert()
		.success();

	assert_eq!(std::fs::read_to_string(&file)?, "cli team");

	Ok(())
}
