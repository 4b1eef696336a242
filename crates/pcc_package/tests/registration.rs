mod common;

use std::io::Cursor;
use std::path::PathBuf;

use binrw::Endian;
use pcc_package::{
    error::{Error, Result},
    read::LoadOptions,
    register::{register_blank_package_creator, register_stream_loader},
    registry::GAME_IDENTIFIERS,
    Game,
};
use pretty_assertions::assert_eq;

use common::sample;

// Registration is process wide, so both hooks are exercised from a single test.
#[test]
fn hooks_register_once() -> Result<()> {
    let create = register_blank_package_creator()?;
    let load = register_stream_loader()?;

    assert!(matches!(
        register_blank_package_creator(),
        Err(Error::AlreadyRegistered("blank package creator"))
    ));
    assert!(matches!(
        register_stream_loader(),
        Err(Error::AlreadyRegistered("stream loader"))
    ));

    let blank = create(Some(PathBuf::from("BioD_Cit001_LOC_INT.pcc")), Game::ME2);
    assert_eq!(blank.game(), Game::ME2);
    assert_eq!(blank.unreal_version(), 512);
    assert!(blank.exports().is_empty());

    let id = GAME_IDENTIFIERS
        .iter()
        .find(|id| id.game == Game::LE2 && id.endian == Endian::Little)
        .unwrap();
    let package = load(Box::new(Cursor::new(sample(id).build())), LoadOptions::default())?;
    assert_eq!(package.game(), Game::LE2);
    assert_eq!(package.exports().len(), 3);

    Ok(())
}
