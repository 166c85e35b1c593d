//! Telegrams captured from real meters, shared by the tests of this module.

pub const ELL5_TELEGRAM: &str = concat!(
    "/ELL5\\253833635_A\r\n",
    "\r\n",
    "0-0:1.0.0(210217184019W)\r\n",
    "1-0:1.8.0(00006678.394*kWh)\r\n",
    "1-0:2.8.0(00000000.000*kWh)\r\n",
    "1-0:3.8.0(00000021.988*kvarh)\r\n",
    "1-0:4.8.0(00001020.971*kvarh)\r\n",
    "1-0:1.7.0(0001.727*kW)\r\n",
    "1-0:2.7.0(0000.000*kW)\r\n",
    "1-0:3.7.0(0000.000*kvar)\r\n",
    "1-0:4.7.0(0000.309*kvar)\r\n",
    "1-0:21.7.0(0001.023*kW)\r\n",
    "1-0:41.7.0(0000.350*kW)\r\n",
    "1-0:61.7.0(0000.353*kW)\r\n",
    "1-0:22.7.0(0000.000*kW)\r\n",
    "1-0:42.7.0(0000.000*kW)\r\n",
    "1-0:62.7.0(0000.000*kW)\r\n",
    "1-0:23.7.0(0000.000*kvar)\r\n",
    "1-0:43.7.0(0000.000*kvar)\r\n",
    "1-0:63.7.0(0000.000*kvar)\r\n",
    "1-0:24.7.0(0000.009*kvar)\r\n",
    "1-0:44.7.0(0000.161*kvar)\r\n",
    "1-0:64.7.0(0000.138*kvar)\r\n",
    "1-0:32.7.0(240.3*V)\r\n",
    "1-0:52.7.0(240.1*V)\r\n",
    "1-0:72.7.0(241.3*V)\r\n",
    "1-0:31.7.0(004.2*A)\r\n",
    "1-0:51.7.0(001.6*A)\r\n",
    "1-0:71.7.0(001.7*A)\r\n",
    "!7945\r\n",
);

pub const LGF5_TELEGRAM: &str = concat!(
    "/LGF5E360\r\n",
    "\r\n",
    "0-0:1.0.0(220330220600W)\r\n",
    "1-0:1.8.0(00005895.962*kWh)\r\n",
    "1-0:2.8.0(00001044.196*kWh)\r\n",
    "1-0:3.8.0(00001783.044*kVArh)\r\n",
    "1-0:4.8.0(00000454.226*kVArh)\r\n",
    "1-0:1.7.0(0000.699*kW)\r\n",
    "1-0:2.7.0(0000.000*kW)\r\n",
    "1-0:3.7.0(0000.000*kVAr)\r\n",
    "1-0:4.7.0(0000.028*kVAr)\r\n",
    "1-0:21.7.0(0000.121*kW)\r\n",
    "1-0:22.7.0(0000.000*kW)\r\n",
    "1-0:41.7.0(0000.152*kW)\r\n",
    "1-0:42.7.0(0000.000*kW)\r\n",
    "1-0:61.7.0(0000.425*kW)\r\n",
    "1-0:62.7.0(0000.000*kW)\r\n",
    "1-0:23.7.0(0000.000*kVAr)\r\n",
    "1-0:24.7.0(0000.045*kVAr)\r\n",
    "1-0:43.7.0(0000.000*kVAr)\r\n",
    "1-0:44.7.0(0000.081*kVAr)\r\n",
    "1-0:63.7.0(0000.098*kVAr)\r\n",
    "1-0:64.7.0(0000.000*kVAr)\r\n",
    "1-0:32.7.0(228.4*V)\r\n",
    "1-0:52.7.0(229.1*V)\r\n",
    "1-0:72.7.0(228.3*V)\r\n",
    "1-0:31.7.0(000.5*A)\r\n",
    "1-0:51.7.0(000.7*A)\r\n",
    "1-0:71.7.0(001.9*A)\r\n",
    "!830C\r\n",
);

/// (code, value, unit) of every measurement in [`ELL5_TELEGRAM`]
pub const ELL5_MEASUREMENTS: [(&str, f64, &str); 26] = [
    ("1-0:1.8.0", 6678.394, "kWh"),
    ("1-0:2.8.0", 0.0, "kWh"),
    ("1-0:3.8.0", 21.988, "kvarh"),
    ("1-0:4.8.0", 1020.971, "kvarh"),
    ("1-0:1.7.0", 1.727, "kW"),
    ("1-0:2.7.0", 0.0, "kW"),
    ("1-0:3.7.0", 0.0, "kvar"),
    ("1-0:4.7.0", 0.309, "kvar"),
    ("1-0:21.7.0", 1.023, "kW"),
    ("1-0:41.7.0", 0.350, "kW"),
    ("1-0:61.7.0", 0.353, "kW"),
    ("1-0:22.7.0", 0.0, "kW"),
    ("1-0:42.7.0", 0.0, "kW"),
    ("1-0:62.7.0", 0.0, "kW"),
    ("1-0:23.7.0", 0.0, "kvar"),
    ("1-0:43.7.0", 0.0, "kvar"),
    ("1-0:63.7.0", 0.0, "kvar"),
    ("1-0:24.7.0", 0.009, "kvar"),
    ("1-0:44.7.0", 0.161, "kvar"),
    ("1-0:64.7.0", 0.138, "kvar"),
    ("1-0:32.7.0", 240.3, "V"),
    ("1-0:52.7.0", 240.1, "V"),
    ("1-0:72.7.0", 241.3, "V"),
    ("1-0:31.7.0", 4.2, "A"),
    ("1-0:51.7.0", 1.6, "A"),
    ("1-0:71.7.0", 1.7, "A"),
];
