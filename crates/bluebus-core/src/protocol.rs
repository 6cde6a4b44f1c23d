//! Bus names, interface names and signal members of the remote daemon

// ----------------------------------------------------------------------------
// Service and Interfaces
// ----------------------------------------------------------------------------

/// Well-known bus name of the Bluetooth daemon
pub const BLUEZ_SERVICE: &str = "org.bluez";

/// Interface advertised by device objects; the device-interface key of announcements
pub const DEVICE_INTERFACE: &str = "org.bluez.Device1";

/// Interface advertised by adapter objects
pub const ADAPTER_INTERFACE: &str = "org.bluez.Adapter1";

/// Path of the daemon's object manager
pub const OBJECT_MANAGER_PATH: &str = "/";

// ----------------------------------------------------------------------------
// Broadcast Signals
// ----------------------------------------------------------------------------

pub const OBJECT_MANAGER_INTERFACE: &str = "org.freedesktop.DBus.ObjectManager";
pub const INTERFACES_ADDED: &str = "InterfacesAdded";
pub const INTERFACES_REMOVED: &str = "InterfacesRemoved";

pub const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";
pub const PROPERTIES_CHANGED: &str = "PropertiesChanged";

// ----------------------------------------------------------------------------
// Methods
// ----------------------------------------------------------------------------

pub const SET_DISCOVERY_FILTER: &str = "SetDiscoveryFilter";
pub const START_DISCOVERY: &str = "StartDiscovery";
pub const STOP_DISCOVERY: &str = "StopDiscovery";
pub const CONNECT: &str = "Connect";
pub const DISCONNECT: &str = "Disconnect";
pub const PAIR: &str = "Pair";
