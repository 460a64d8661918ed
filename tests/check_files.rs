//! This module is an integration test that exercises the checking of
//! submitted files: finding the metadata documents and resolving their
//! sources.
#![cfg(test)]

use contract_verifier::{
    chain::Chain,
    error::{intake, source, Error},
    intake::RawArtifact,
    utility::keccak256_hex,
};

mod common;

use common::{
    metadata_embedding,
    metadata_referencing,
    offline_verifier,
    MemoryRepository,
    LIBRARY_FILE,
    LIBRARY_SOURCE,
    TOKEN_FILE,
    TOKEN_SOURCE,
};

#[test]
fn resolves_sources_from_the_upload() -> anyhow::Result<()> {
    let verifier = offline_verifier();
    let artifacts = vec![
        RawArtifact::named(
            "metadata.json",
            metadata_referencing(
                TOKEN_FILE,
                "Token",
                &[(TOKEN_FILE, TOKEN_SOURCE), (LIBRARY_FILE, LIBRARY_SOURCE)],
            ),
        ),
        RawArtifact::named("Token.sol", TOKEN_SOURCE),
        RawArtifact::named("Math.sol", LIBRARY_SOURCE),
    ];

    let checked = verifier.check_files(&artifacts)?;

    assert!(checked.is_complete());
    assert_eq!(checked.error(), None);
    assert_eq!(checked.files().len(), 1);

    // Every resolved source hashes to the hash its metadata declares
    let file = &checked.files()[0];
    for (name, entry) in &file.metadata.sources {
        let content = file.sources.get(name).expect("every source is resolved");
        assert_eq!(keccak256_hex(content), entry.keccak256);
    }

    Ok(())
}

#[test]
fn resolves_embedded_sources() -> anyhow::Result<()> {
    let verifier = offline_verifier();
    let artifacts = vec![RawArtifact::new(metadata_embedding(
        TOKEN_FILE,
        "Token",
        &[(TOKEN_FILE, TOKEN_SOURCE)],
    ))];

    let checked = verifier.check_files(&artifacts)?;

    assert_eq!(checked.files()[0].sources.get(TOKEN_FILE), Some(TOKEN_SOURCE));

    Ok(())
}

#[test]
fn accepts_double_encoded_metadata() -> anyhow::Result<()> {
    let verifier = offline_verifier();
    let metadata = metadata_referencing(TOKEN_FILE, "Token", &[(TOKEN_FILE, TOKEN_SOURCE)]);
    let artifacts = vec![
        RawArtifact::named("metadata.json", serde_json::to_string(&metadata)?),
        RawArtifact::named("Token.sol", TOKEN_SOURCE),
    ];

    let checked = verifier.check_files(&artifacts)?;

    assert_eq!(checked.files().len(), 1);

    Ok(())
}

#[test]
fn rejects_tampered_embedded_sources() -> anyhow::Result<()> {
    let verifier = offline_verifier();
    let tampered = metadata_embedding(TOKEN_FILE, "Token", &[(TOKEN_FILE, TOKEN_SOURCE)])
        .replace("contract Token", "contract Tokem");
    let artifacts = vec![RawArtifact::new(tampered)];

    let checked = verifier.check_files(&artifacts)?;

    assert!(checked.files().is_empty());
    assert_eq!(
        checked.errors().for_document(0).next(),
        Some(&Error::Source(source::Error::InvalidContent {
            file: TOKEN_FILE.into(),
        }))
    );
    assert_eq!(
        checked.error(),
        Some(format!("Invalid content for file {TOKEN_FILE}"))
    );

    Ok(())
}

#[test]
fn finds_sources_by_content_rather_than_name() -> anyhow::Result<()> {
    let verifier = offline_verifier();
    let metadata = RawArtifact::named(
        "metadata.json",
        metadata_referencing(TOKEN_FILE, "Token", &[(TOKEN_FILE, TOKEN_SOURCE)]),
    );

    // Without the source the document cannot be resolved
    let checked = verifier.check_files(&[metadata.clone()])?;
    let expected = Error::Source(source::Error::MissingSource {
        file: TOKEN_FILE.into(),
        hash: keccak256_hex(TOKEN_SOURCE),
    });
    assert_eq!(checked.errors().for_document(0).next(), Some(&expected));
    assert!(checked
        .error()
        .is_some_and(|message| message.contains(&keccak256_hex(TOKEN_SOURCE))));

    // Uploading it under an unrelated name is enough
    let checked = verifier.check_files(&[
        metadata,
        RawArtifact::named("renamed-by-the-user.txt", TOKEN_SOURCE),
    ])?;
    assert!(checked.is_complete());
    assert_eq!(checked.files()[0].sources.get(TOKEN_FILE), Some(TOKEN_SOURCE));

    Ok(())
}

#[test]
fn reports_the_latest_failure_without_blocking_others() -> anyhow::Result<()> {
    let verifier = offline_verifier();
    let artifacts = vec![
        RawArtifact::new(metadata_referencing(
            LIBRARY_FILE,
            "Math",
            &[(LIBRARY_FILE, "library Gone {}")],
        )),
        RawArtifact::new(metadata_referencing(
            TOKEN_FILE,
            "Token",
            &[(TOKEN_FILE, TOKEN_SOURCE)],
        )),
        RawArtifact::new(
            metadata_embedding(TOKEN_FILE, "Token", &[(TOKEN_FILE, TOKEN_SOURCE)])
                .replace("Token {}", "Token { }"),
        ),
        RawArtifact::new(TOKEN_SOURCE),
    ];

    let checked = verifier.check_files(&artifacts)?;

    assert_eq!(checked.files().len(), 1);
    assert_eq!(checked.files()[0].document, 1);

    let failed: Vec<_> = checked.errors().payloads().iter().map(|e| e.document).collect();
    assert_eq!(failed, vec![0, 2]);
    assert_eq!(
        checked.error(),
        Some(format!("Invalid content for file {TOKEN_FILE}"))
    );

    Ok(())
}

#[test]
fn ignores_metadata_for_other_languages() {
    let verifier = offline_verifier();
    let vyper = metadata_referencing(TOKEN_FILE, "Token", &[(TOKEN_FILE, TOKEN_SOURCE)])
        .replace("\"Solidity\"", "\"Vyper\"");

    assert_eq!(
        verifier.check_files(&[RawArtifact::new(vyper), RawArtifact::new(TOKEN_SOURCE)]),
        Err(Error::Intake(intake::Error::MetadataNotFound))
    );
    assert_eq!(
        verifier.check_files(&[]),
        Err(Error::Intake(intake::Error::NoFiles))
    );
}

#[test]
fn checks_files_stored_for_an_address() -> anyhow::Result<()> {
    let verifier = offline_verifier();
    let repository = MemoryRepository::default().with(
        "mainnet",
        "0xabc",
        vec![RawArtifact::new(metadata_embedding(
            TOKEN_FILE,
            "Token",
            &[(TOKEN_FILE, TOKEN_SOURCE)],
        ))],
    );

    let checked = verifier.check_address_files(&repository, &Chain::from("mainnet"), "0xabc")?;
    assert_eq!(checked.files().len(), 1);

    let missing = verifier.check_address_files(&repository, &Chain::from("goerli"), "0xabc");
    assert_eq!(
        missing,
        Err(Error::Intake(intake::Error::AddressNotFound {
            chain:   "goerli".into(),
            address: "0xabc".into(),
        }))
    );

    Ok(())
}
