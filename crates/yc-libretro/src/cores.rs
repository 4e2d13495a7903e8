//! Registration of the statically linked cores enabled at build time

#[allow(unused_imports)]
use crate::registry::{CoreDescriptor, System};

#[cfg(feature = "fceumm")]
inventory::submit! {
    CoreDescriptor::new("fceumm", "FCEUmm", &[System::Nes], yc_ffi::static_cores::fceumm::api)
}

#[cfg(feature = "bsnes")]
inventory::submit! {
    CoreDescriptor::new("bsnes", "bsnes", &[System::Snes], yc_ffi::static_cores::bsnes::api)
}

#[cfg(feature = "gambatte")]
inventory::submit! {
    CoreDescriptor::new(
        "gambatte",
        "Gambatte",
        &[System::GameBoy, System::GameBoyColor],
        yc_ffi::static_cores::gambatte::api,
    )
}

#[cfg(feature = "mgba")]
inventory::submit! {
    CoreDescriptor::new(
        "mgba",
        "mGBA",
        &[System::GameBoyAdvance],
        yc_ffi::static_cores::mgba::api,
    )
}

#[cfg(feature = "clownmdemu")]
inventory::submit! {
    CoreDescriptor::new(
        "clownmdemu",
        "ClownMDEmu",
        &[System::Genesis],
        yc_ffi::static_cores::clownmdemu::api,
    )
}

#[cfg(feature = "melonds")]
inventory::submit! {
    CoreDescriptor::new(
        "melonds",
        "melonDS",
        &[System::NintendoDs],
        yc_ffi::static_cores::melonds::api,
    )
}

#[cfg(feature = "mupen64plus_next")]
inventory::submit! {
    CoreDescriptor::new(
        "mupen64plus_next",
        "Mupen64Plus-Next",
        &[System::Nintendo64],
        yc_ffi::static_cores::mupen64plus_next::api,
    )
}

#[cfg(feature = "pcsx_rearmed")]
inventory::submit! {
    CoreDescriptor::new(
        "pcsx_rearmed",
        "PCSX ReARMed",
        &[System::PlayStation],
        yc_ffi::static_cores::pcsx_rearmed::api,
    )
}

/// Ids of the cores compiled into this build, test pattern excluded
pub fn linked_core_ids() -> Vec<&'static str> {
    let mut ids = Vec::new();
    if cfg!(feature = "fceumm") {
        ids.push("fceumm");
    }
    if cfg!(feature = "bsnes") {
        ids.push("bsnes");
    }
    if cfg!(feature = "gambatte") {
        ids.push("gambatte");
    }
    if cfg!(feature = "mgba") {
        ids.push("mgba");
    }
    if cfg!(feature = "clownmdemu") {
        ids.push("clownmdemu");
    }
    if cfg!(feature = "melonds") {
        ids.push("melonds");
    }
    if cfg!(feature = "mupen64plus_next") {
        ids.push("mupen64plus_next");
    }
    if cfg!(feature = "pcsx_rearmed") {
        ids.push("pcsx_rearmed");
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CoreRegistry;

    #[test]
    fn test_linked_cores_are_registered() {
        let registry = CoreRegistry::builtin();
        for id in linked_core_ids() {
            assert!(registry.find(id).is_some(), "{} not registered", id);
        }
    }
}
