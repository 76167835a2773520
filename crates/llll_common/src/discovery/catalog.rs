//! Powered Up device catalog
//!
//! Maps the numeric id a `PUPDevice` reports to the device's name and the
//! pybricks class/module a program would use to drive it.

/// What a device id means to a program author
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub id: u32,
    pub name: &'static str,
    pub class: &'static str,
    pub module: &'static str,
}

const PUPDEVICES: &str = "pybricks.pupdevices";

const fn device(id: u32, name: &'static str, class: &'static str) -> DeviceDescriptor {
    DeviceDescriptor {
        id,
        name,
        class,
        module: PUPDEVICES,
    }
}

/// Every device id the probe can report that we know by name
pub const DEVICE_CATALOG: &[DeviceDescriptor] = &[
    device(1, "Powered Up Medium Motor", "DCMotor"),
    device(2, "Powered Up Train Motor", "DCMotor"),
    device(8, "Powered Up Light", "Light"),
    device(34, "WeDo 2.0 Tilt Sensor", "TiltSensor"),
    device(35, "WeDo 2.0 Motion Sensor", "InfraredSensor"),
    device(37, "BOOST Color Distance Sensor", "ColorDistanceSensor"),
    device(38, "BOOST Interactive Motor", "Motor"),
    device(46, "Technic Large Motor", "Motor"),
    device(47, "Technic XL Motor", "Motor"),
    device(48, "SPIKE Medium Angular Motor", "Motor"),
    device(49, "SPIKE Large Angular Motor", "Motor"),
    device(61, "Color Sensor", "ColorSensor"),
    device(62, "Ultrasonic Sensor", "UltrasonicSensor"),
    device(63, "Force Sensor", "ForceSensor"),
    device(64, "3x3 Color Light Matrix", "ColorLightMatrix"),
    device(65, "Technic Small Angular Motor", "Motor"),
    device(75, "Technic Medium Angular Motor", "Motor"),
    device(76, "Technic Large Angular Motor", "Motor"),
];

/// Look up a device id
pub fn lookup(id: u32) -> Option<&'static DeviceDescriptor> {
    DEVICE_CATALOG.iter().find(|d| d.id == id)
}

/// Label for an id that isn't in the catalog
pub fn unknown_device_label(id: u32) -> String {
    format!("Unknown (ID {})", id)
}
