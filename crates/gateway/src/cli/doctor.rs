use inv_domain::config::{Config, ConfigSeverity};
use inv_domain::model::ScenarioManifest;

/// Run all diagnostic checks and print a summary.
///
/// Returns `Ok(true)` when every check passes, `Ok(false)` when at least
/// one check failed.
pub async fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("inv-gateway doctor");
    println!("===================\n");

    let mut all_passed = true;

    check_config_file(config_path, &mut all_passed);
    check_config_validation(config, &mut all_passed);
    check_storage_dir(config, &mut all_passed);
    check_scenarios(config, &mut all_passed);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

fn check_config_file(config_path: &str, all_passed: &mut bool) {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file exists",
        exists,
        if exists {
            config_path.to_owned()
        } else {
            format!("{config_path} not found (using defaults)")
        },
    );
    if !exists {
        *all_passed = false;
    }
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
    } else {
        print_check(
            "Config validation",
            error_count == 0,
            format!("{} issue(s) ({} error(s))", issues.len(), error_count),
        );
        for issue in &issues {
            println!("      {issue}");
        }
        if error_count > 0 {
            *all_passed = false;
        }
    }
}

fn check_storage_dir(config: &Config, all_passed: &mut bool) {
    let path = &config.storage.state_dir;
    let writable = std::fs::create_dir_all(path).is_ok() && {
        let probe = path.join(".inv_gateway_doctor_probe");
        let ok = std::fs::write(&probe, b"probe").is_ok();
        let _ = std::fs::remove_file(&probe);
        ok
    };

    print_check(
        "Storage directory writable",
        writable,
        if writable {
            path.display().to_string()
        } else {
            format!("{} (not writable)", path.display())
        },
    );
    if !writable {
        *all_passed = false;
    }
}

fn check_scenarios(config: &Config, all_passed: &mut bool) {
    if config.scenarios.is_empty() {
        print_check("Scenarios configured", false, "none configured".into());
        *all_passed = false;
        return;
    }

    for entry in &config.scenarios {
        let manifest = ScenarioManifest::load_from_file(&entry.manifest_path);
        let manifest_ok = manifest.is_ok();
        print_check(
            &format!("Scenario \"{}\" manifest", entry.name),
            manifest_ok,
            match &manifest {
                Ok(m) => format!("{} ({} agent(s))", entry.manifest_path.display(), m.agents.len()),
                Err(e) => format!("{}: {e}", entry.manifest_path.display()),
            },
        );
        if !manifest_ok {
            *all_passed = false;
            continue;
        }

        let fleet_path = config
            .storage
            .state_dir
            .join("fleets")
            .join(format!("{}.fleet.json", entry.name));
        let fleet_exists = fleet_path.exists();
        print_check(
            &format!("Scenario \"{}\" fleet provisioned", entry.name),
            fleet_exists,
            if fleet_exists {
                fleet_path.display().to_string()
            } else {
                format!(
                    "{} not found — run `inv-gateway provision {}` first",
                    fleet_path.display(),
                    entry.name,
                )
            },
        );
        if !fleet_exists {
            *all_passed = false;
        }
    }
}

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
