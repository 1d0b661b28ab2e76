// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! # Grant Flow Example
//!
//! Walks one subject through the consent lifecycle against the in-memory
//! adapter: publish a policy, grant, narrow the grant, publish a new policy
//! version, then lose a required scope.  Run with:
//!
//! ```bash
//! RUST_LOG=consentkit_core=debug cargo run --example grant_flow --features config-loader
//! ```
//!
//! `CONSENTKIT_*` environment variables are honoured (see
//! `consentkit_core::config_loader`).

use chrono::Utc;
use consentkit_core::{
    config::Config,
    config_loader::load_config_from_env,
    memory::MemoryAdapter,
    services::ConsentServices,
    types::{
        ConsentMetadata, Consenter, ContentSection, CreateConsentInput, CreatePolicyInput,
        PolicyScope, PolicyStatus, PolicyVersionInput,
    },
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn scope(key: &str, name: &str, required: bool) -> PolicyScope {
    PolicyScope {
        key: key.into(),
        name: name.into(),
        description: format!("{name} processing"),
        required: Some(required),
    }
}

fn grant(subject_id: &str, policy_id: &str, granted: &[&str], revoked: &[&str]) -> CreateConsentInput {
    CreateConsentInput {
        subject_id: subject_id.into(),
        policy_id: policy_id.into(),
        consenter: Consenter::SelfConsent { user_id: subject_id.into() },
        granted_scopes: granted.iter().map(|s| (*s).to_owned()).collect(),
        revoked_scopes: revoked.iter().map(|s| (*s).to_owned()).collect(),
        date_of_birth: None,
        metadata: ConsentMetadata {
            consent_method: "web_form".into(),
            ip_address: Some("198.51.100.24".into()),
            user_agent: Some("grant-flow-example".into()),
        },
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let loaded = load_config_from_env()?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(loaded.log_filter.clone())),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    println!("consentkit grant flow\n");
    if let Some(path) = &loaded.data_file {
        println!("(data_file {path} is ignored here; this example keeps everything in memory)\n");
    }

    // -----------------------------------------------------------------------
    // 1. Build the services for one store
    // -----------------------------------------------------------------------
    let config: Config = loaded.into();
    let services = ConsentServices::new(MemoryAdapter::new(), config);

    // -----------------------------------------------------------------------
    // 2. Publish a policy
    // -----------------------------------------------------------------------
    let policy = services
        .policy
        .create_policy(CreatePolicyInput {
            policy_group_id: Some("privacy-notice".into()),
            title: "Privacy notice".into(),
            status: Some(PolicyStatus::Active),
            effective_date: Some(Utc::now()),
            jurisdiction: Some("EU".into()),
            content_sections: Some(vec![ContentSection {
                title: "What we collect".into(),
                description: "Summary".into(),
                content: "Account details and usage data.".into(),
            }]),
            available_scopes: Some(vec![
                scope("account", "Account", true),
                scope("email", "Email updates", false),
                scope("analytics", "Analytics", false),
            ]),
            ..CreatePolicyInput::default()
        })
        .await?;
    println!("Policy {} v{} ({})", policy.policy_group_id, policy.version, policy.status);

    // -----------------------------------------------------------------------
    // 3. Grant, then narrow the grant
    // -----------------------------------------------------------------------
    let first = services
        .consent
        .grant_consent(grant("subject-7", &policy.id, &["account", "email", "analytics"], &[]))
        .await?;
    println!("Consent v{}: {}", first.version, first.status);

    let second = services
        .consent
        .grant_consent(grant("subject-7", &policy.id, &["account", "email"], &["analytics"]))
        .await?;
    println!(
        "Consent v{}: {} (granted: {:?}, revoked: {:?})",
        second.version,
        second.status,
        second.granted_scopes.keys().collect::<Vec<_>>(),
        second.revoked_scopes.keys().collect::<Vec<_>>(),
    );

    let status = services
        .consent
        .get_subject_consent_status("subject-7", &["account", "email", "analytics"], Some(&policy.id))
        .await?;
    println!("Scope status: {status:?}\n");

    // -----------------------------------------------------------------------
    // 4. Publish a new policy version
    // -----------------------------------------------------------------------
    let revised = services
        .policy
        .create_new_policy_version(
            &policy.id,
            PolicyVersionInput {
                title: Some("Privacy notice (revised)".into()),
                status: Some(PolicyStatus::Active),
                ..PolicyVersionInput::default()
            },
        )
        .await?;
    for version in services
        .policy
        .get_all_policy_versions_by_group_id("privacy-notice")
        .await?
    {
        println!("Policy v{}: {}", version.version, version.status);
    }
    println!();

    // -----------------------------------------------------------------------
    // 5. Losing a required scope revokes the whole record
    // -----------------------------------------------------------------------
    services
        .consent
        .grant_consent(grant("subject-7", &revised.id, &["account"], &[]))
        .await?;
    let revoked = services
        .consent
        .grant_consent(grant("subject-7", &revised.id, &["email"], &["account"]))
        .await?;
    println!(
        "Consent on v{}: {} (revoked: {:?})",
        revised.version,
        revoked.status,
        revoked.revoked_scopes.keys().collect::<Vec<_>>(),
    );

    match services
        .consent
        .grant_consent(grant("subject-7", &revised.id, &["account"], &[]))
        .await
    {
        Ok(record) => println!("unexpected re-grant: v{}", record.version),
        Err(err) => println!("Re-grant refused ({:?}): {err}", err.kind()),
    }

    Ok(())
}
