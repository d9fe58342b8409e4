#![cfg(windows)]

use blpin_core::policy::{ComplexityLevel, Policy};
use blpin_core::setup::PolicyStore;
use blpin_windows::registry::RegistryPolicyStore;
use uuid::Uuid;
use winreg::enums::HKEY_CURRENT_USER;
use winreg::RegKey;

#[test]
fn reads_minimum_length_and_enhanced_flag() {
    let (key_path, _guard) = create_test_key();

    let hkcu = RegKey::predef(HKEY_CURRENT_USER);
    let (key, _disp) = hkcu.create_subkey(&key_path).expect("create subkey");
    key.set_value("MinimumPIN", &6u32).expect("set dword");
    key.set_value("UseEnhancedPin", &1u32).expect("set dword");

    let store = RegistryPolicyStore::new(RegKey::predef(HKEY_CURRENT_USER), &key_path);
    let policy = store.read_policy();
    assert_eq!(policy.min_length, 6);
    assert_eq!(policy.complexity, ComplexityLevel::Enhanced);
}

#[test]
fn missing_key_or_wrong_type_yields_defaults() {
    let (key_path, _guard) = create_test_key();

    let store = RegistryPolicyStore::new(RegKey::predef(HKEY_CURRENT_USER), &key_path);
    assert_eq!(store.read_policy(), Policy::default());

    let hkcu = RegKey::predef(HKEY_CURRENT_USER);
    let (key, _disp) = hkcu.create_subkey(&key_path).expect("create subkey");
    key.set_value("MinimumPIN", &"twelve").expect("set sz");
    assert_eq!(store.read_policy(), Policy::default());
}

fn create_test_key() -> (String, CleanupKey) {
    let path = format!("Software\\BitLockerPinTest\\{}", Uuid::new_v4());
    (path.clone(), CleanupKey(path))
}

struct CleanupKey(String);

impl Drop for CleanupKey {
    fn drop(&mut self) {
        let hkcu = RegKey::predef(HKEY_CURRENT_USER);
        let _ = hkcu.delete_subkey_all(&self.0);
    }
}
