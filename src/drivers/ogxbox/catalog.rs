//! Known original Xbox controllers. Devices missing from this table are
//! ignored during discovery.

/// A supported controller model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownDevice {
    pub vendor_id: u16,
    pub product_id: u16,
    pub name: &'static str,
}

const fn device(vendor_id: u16, product_id: u16, name: &'static str) -> KnownDevice {
    KnownDevice {
        vendor_id,
        product_id,
        name,
    }
}

pub const DEVICES: [KnownDevice; 40] = [
    device(0x044F, 0x0F07, "Thrustmaster Controller"),
    device(0x045E, 0x0202, "Microsoft Xbox Controller v1 (US)"),
    device(0x045E, 0x0285, "Microsoft Xbox Controller S (Japan)"),
    device(0x045E, 0x0287, "Microsoft Xbox Controller S"),
    device(0x045E, 0x0288, "Microsoft Xbox Controller S v2"),
    device(0x045E, 0x0289, "Microsoft Xbox Controller v2 (US)"),
    device(0x046D, 0xCA84, "Logitech Cordless Precision"),
    device(0x046D, 0xCA88, "Logitech Thunderpad"),
    device(0x05FD, 0x1007, "Mad Catz Controller"),
    device(0x05FD, 0x107A, "InterAct PowerPad Pro"),
    device(0x05FE, 0x3030, "Chic Controller"),
    device(0x05FE, 0x3031, "Chic Controller"),
    device(0x062A, 0x0020, "Logic3 Xbox GamePad"),
    device(0x06A3, 0x0201, "Saitek Adrenalin"),
    device(0x0738, 0x4506, "MadCatz 4506 Wireless Controller"),
    device(0x0738, 0x4516, "MadCatz Control Pad"),
    device(0x0738, 0x4520, "MadCatz Control Pad Pro"),
    device(0x0738, 0x4522, "MadCatz LumiCON"),
    device(0x0738, 0x4526, "MadCatz Control Pad Pro"),
    device(0x0738, 0x4536, "MadCatz MicroCON"),
    device(0x0738, 0x4556, "MadCatz Lynx Wireless Controller"),
    device(0x0738, 0x4586, "MadCatz MicroCon Wireless Controller"),
    device(0x0738, 0x4588, "MadCatz Blaster"),
    device(0x0C12, 0x0005, "Intec Wireless"),
    device(0x0C12, 0x8801, "Nyko Xbox Controller"),
    device(0x0C12, 0x8802, "Zeroplus Xbox Controller"),
    device(0x0C12, 0x880A, "Pelican Eclipse PL-2023"),
    device(0x0C12, 0x8810, "Zeroplus Xbox Controller"),
    device(0x0C12, 0x9902, "HAMA VibraX"),
    device(0x0E4C, 0x1097, "Radica Gamester Controller"),
    device(0x0E4C, 0x2390, "Radica Games Jtech Controller"),
    device(0x0E4C, 0x3510, "Radica Gamester"),
    device(0x0E6F, 0x0003, "Logic3 Freebird Wireless Controller"),
    device(0x0E6F, 0x0005, "Eclipse Wireless Controller"),
    device(0x0E6F, 0x0006, "Edge Wireless Controller"),
    device(0x0E6F, 0x0008, "Afterglow Pro Controller"),
    device(0x0F30, 0x010B, "Philips Recoil"),
    device(0x0F30, 0x0202, "Joytech Advanced Controller"),
    device(0x0F30, 0x8888, "BigBen XBMiniPad Controller"),
    device(0x102C, 0xFF0C, "Joytech Wireless Advanced Controller"),
];

/// Returns the catalog entry for the given vendor and product id
pub fn lookup(vendor_id: u16, product_id: u16) -> Option<&'static KnownDevice> {
    DEVICES
        .iter()
        .find(|d| d.vendor_id == vendor_id && d.product_id == product_id)
}

/// Returns true if the given vendor and product id is a known controller
pub fn is_supported(vendor_id: u16, product_id: u16) -> bool {
    lookup(vendor_id, product_id).is_some()
}
