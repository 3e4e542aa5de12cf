//! Engine backed by the `dss_capi` shared library.
//!
//! Requires `libdss_capi` on the linker path. The library holds one global
//! engine instance, so a `CApiEngine` is `!Send`: one session
//! per thread, driven by one caller.

use crate::error::{EngineError, EngineResult};
use crate::model::{DssEngine, ElementArray, SolveMode, VoltageForm};
use dss_core::{ElementClass, ElementRef};
use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::os::raw::c_char;
use tracing::debug;

const BACKEND: &str = "dss_capi";

#[allow(non_snake_case)]
mod ffi {
    use std::os::raw::{c_char, c_double};

    pub type DoubleGetter = unsafe extern "C" fn(*mut *mut c_double, *mut i32);
    pub type StringsGetter = unsafe extern "C" fn(*mut *mut *mut c_char, *mut i32);

    #[link(name = "dss_capi")]
    unsafe extern "C" {
        pub fn DSS_Start(code: i32) -> u16;
        pub fn DSS_Dispose_PDouble(p: *mut *mut c_double);
        pub fn DSS_Dispose_PPAnsiChar(p: *mut *mut *mut c_char, count: i32);

        pub fn Error_Get_Number() -> i32;
        pub fn Error_Get_Description() -> *const c_char;

        pub fn Text_Set_Command(value: *const c_char);
        pub fn Text_Get_Result() -> *const c_char;

        pub fn Circuit_Get_Name() -> *const c_char;
        pub fn Circuit_Get_AllBusNames(r: *mut *mut *mut c_char, dims: *mut i32);
        pub fn Circuit_Get_AllElementNames(r: *mut *mut *mut c_char, dims: *mut i32);
        pub fn Circuit_SetActiveBus(name: *const c_char) -> i32;
        pub fn Circuit_SetActiveClass(name: *const c_char) -> i32;
        pub fn Circuit_Get_TotalPower(r: *mut *mut c_double, dims: *mut i32);
        pub fn Circuit_Get_Losses(r: *mut *mut c_double, dims: *mut i32);
        pub fn Circuit_UpdateStorage();

        pub fn Bus_Get_NumNodes() -> i32;
        pub fn Bus_Get_puVmagAngle(r: *mut *mut c_double, dims: *mut i32);
        pub fn Bus_Get_VMagAngle(r: *mut *mut c_double, dims: *mut i32);
        pub fn Bus_Get_puVoltages(r: *mut *mut c_double, dims: *mut i32);
        pub fn Bus_Get_Voltages(r: *mut *mut c_double, dims: *mut i32);

        pub fn CktElement_Get_BusNames(r: *mut *mut *mut c_char, dims: *mut i32);
        pub fn CktElement_Get_NumPhases() -> i32;
        pub fn CktElement_Get_Powers(r: *mut *mut c_double, dims: *mut i32);
        pub fn CktElement_Get_Currents(r: *mut *mut c_double, dims: *mut i32);
        pub fn CktElement_Get_CurrentsMagAng(r: *mut *mut c_double, dims: *mut i32);
        pub fn CktElement_Get_Voltages(r: *mut *mut c_double, dims: *mut i32);
        pub fn CktElement_Get_VoltagesMagAng(r: *mut *mut c_double, dims: *mut i32);
        pub fn CktElement_Get_AllPropertyNames(r: *mut *mut *mut c_char, dims: *mut i32);
        pub fn CktElement_Open(term: i32, phs: i32);
        pub fn CktElement_Close(term: i32, phs: i32);
        pub fn CktElement_IsOpen(term: i32, phs: i32) -> u16;

        pub fn DSSProperty_Set_Index(index: i32);
        pub fn DSSProperty_Get_Val() -> *const c_char;
        pub fn DSSProperty_Set_Val(value: *const c_char);

        pub fn ActiveClass_Set_Name(name: *const c_char);
        pub fn ActiveClass_Get_Name() -> *const c_char;
        pub fn ActiveClass_Get_AllNames(r: *mut *mut *mut c_char, dims: *mut i32);

        pub fn Loads_Set_Name(name: *const c_char);
        pub fn Loads_Get_Name() -> *const c_char;
        pub fn Loads_Set_kW(value: c_double);
        pub fn Loads_Set_kvar(value: c_double);
        pub fn PVSystems_Set_Name(name: *const c_char);
        pub fn PVSystems_Get_Name() -> *const c_char;
        pub fn PVSystems_Set_Pmpp(value: c_double);
        pub fn PVSystems_Set_kvar(value: c_double);
        pub fn Generators_Set_Name(name: *const c_char);
        pub fn Generators_Get_Name() -> *const c_char;
        pub fn Generators_Set_kW(value: c_double);
        pub fn Generators_Set_kvar(value: c_double);
        pub fn Lines_Set_Name(name: *const c_char);
        pub fn Lines_Get_Name() -> *const c_char;
        pub fn Transformers_Set_Name(name: *const c_char);
        pub fn Transformers_Get_Name() -> *const c_char;
        pub fn Capacitors_Set_Name(name: *const c_char);
        pub fn Capacitors_Get_Name() -> *const c_char;
        pub fn RegControls_Set_Name(name: *const c_char);
        pub fn RegControls_Get_Name() -> *const c_char;
        pub fn RegControls_Get_TapNumber() -> i32;
        pub fn RegControls_Set_TapNumber(value: i32);
        pub fn CapControls_Set_Name(name: *const c_char);
        pub fn CapControls_Get_Name() -> *const c_char;
        pub fn CapControls_Get_PTratio() -> c_double;
        pub fn CapControls_Set_PTratio(value: c_double);

        pub fn Solution_SolveNoControl();
        pub fn Solution_Set_Number(value: i32);
        pub fn Solution_Set_Hour(value: i32);
        pub fn Solution_Set_StepSize(value: c_double);
    }
}

/// Copy an engine-owned C string. Null reads as empty.
///
/// # Safety
/// `ptr` must be null or point at a NUL-terminated string that stays valid
/// for the duration of the call.
unsafe fn read_cstr(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        // SAFETY: non-null and NUL-terminated per the caller's contract.
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }
}

fn to_cstring(value: &str) -> EngineResult<CString> {
    CString::new(value).map_err(|_| EngineError::Command {
        command: value.to_string(),
        message: "embedded NUL byte".to_string(),
    })
}

/// Session on the library's global engine instance.
#[derive(Debug)]
pub struct CApiEngine {
    active_class: Option<ElementClass>,
    _not_send: PhantomData<*const ()>,
}

impl CApiEngine {
    /// Start the engine.
    pub fn start() -> EngineResult<Self> {
        // SAFETY: DSS_Start takes no pointers and may be called repeatedly.
        let ok = unsafe { ffi::DSS_Start(0) };
        if ok == 0 {
            return Err(EngineError::Dss {
                code: -1,
                message: "DSS_Start failed".to_string(),
            });
        }
        let engine = Self {
            active_class: None,
            _not_send: PhantomData,
        };
        engine.check()?;
        debug!(backend = BACKEND, "engine started");
        Ok(engine)
    }

    /// Turn the engine's pending error, if any, into an `Err`.
    fn check(&self) -> EngineResult<()> {
        // The description must be read first: reading the number clears it.
        // SAFETY: both calls return engine-owned data and take no arguments.
        let (message, code) = unsafe {
            let message = read_cstr(ffi::Error_Get_Description());
            (message, ffi::Error_Get_Number())
        };
        if code == 0 {
            Ok(())
        } else {
            Err(EngineError::Dss { code, message })
        }
    }

    fn doubles(&self, getter: ffi::DoubleGetter) -> EngineResult<Vec<f64>> {
        let mut ptr: *mut f64 = std::ptr::null_mut();
        let mut dims = [0i32; 4];
        // SAFETY: the engine allocates `ptr` and writes its length to dims[0];
        // the buffer is copied before being handed back for disposal.
        let out = unsafe {
            getter(&mut ptr, dims.as_mut_ptr());
            let out = if ptr.is_null() || dims[0] <= 0 {
                Vec::new()
            } else {
                std::slice::from_raw_parts(ptr, dims[0] as usize).to_vec()
            };
            ffi::DSS_Dispose_PDouble(&mut ptr);
            out
        };
        self.check()?;
        Ok(out)
    }

    fn strings(&self, getter: ffi::StringsGetter) -> EngineResult<Vec<String>> {
        let mut ptr: *mut *mut c_char = std::ptr::null_mut();
        let mut dims = [0i32; 4];
        // SAFETY: as in `doubles`; each entry is a NUL-terminated string.
        let out = unsafe {
            getter(&mut ptr, dims.as_mut_ptr());
            let out = if ptr.is_null() || dims[0] <= 0 {
                Vec::new()
            } else {
                std::slice::from_raw_parts(ptr, dims[0] as usize)
                    .iter()
                    .map(|s| read_cstr(*s))
                    .collect()
            };
            ffi::DSS_Dispose_PPAnsiChar(&mut ptr, dims[1]);
            out
        };
        self.check()?;
        Ok(out)
    }

    fn select_by_class(&self, class: &ElementClass, name: &CString) -> EngineResult<String> {
        // SAFETY: `name` outlives each call; returned strings are copied.
        let active = unsafe {
            match class {
                ElementClass::Load => {
                    ffi::Loads_Set_Name(name.as_ptr());
                    read_cstr(ffi::Loads_Get_Name())
                }
                ElementClass::PV => {
                    ffi::PVSystems_Set_Name(name.as_ptr());
                    read_cstr(ffi::PVSystems_Get_Name())
                }
                ElementClass::Generator => {
                    ffi::Generators_Set_Name(name.as_ptr());
                    read_cstr(ffi::Generators_Get_Name())
                }
                ElementClass::Line => {
                    ffi::Lines_Set_Name(name.as_ptr());
                    read_cstr(ffi::Lines_Get_Name())
                }
                ElementClass::Transformer => {
                    ffi::Transformers_Set_Name(name.as_ptr());
                    read_cstr(ffi::Transformers_Get_Name())
                }
                ElementClass::Capacitor => {
                    ffi::Capacitors_Set_Name(name.as_ptr());
                    read_cstr(ffi::Capacitors_Get_Name())
                }
                ElementClass::RegControl => {
                    ffi::RegControls_Set_Name(name.as_ptr());
                    read_cstr(ffi::RegControls_Get_Name())
                }
                ElementClass::CapControl => {
                    ffi::CapControls_Set_Name(name.as_ptr());
                    read_cstr(ffi::CapControls_Get_Name())
                }
                ElementClass::Storage | ElementClass::Other(_) => {
                    let class_name = to_cstring(class.dss_name())?;
                    ffi::Circuit_SetActiveClass(class_name.as_ptr());
                    ffi::ActiveClass_Set_Name(name.as_ptr());
                    read_cstr(ffi::ActiveClass_Get_Name())
                }
            }
        };
        Ok(active.to_ascii_lowercase())
    }

    fn active_class(&self) -> EngineResult<&ElementClass> {
        self.active_class
            .as_ref()
            .ok_or(EngineError::NoActive { what: "element" })
    }
}

impl DssEngine for CApiEngine {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn command(&mut self, cmd: &str) -> EngineResult<String> {
        let c = to_cstring(cmd)?;
        debug!(backend = BACKEND, command = cmd, "command");
        // SAFETY: `c` outlives the call; the result string is copied.
        let result = unsafe {
            ffi::Text_Set_Command(c.as_ptr());
            read_cstr(ffi::Text_Get_Result())
        };
        self.check().map_err(|e| match e {
            EngineError::Dss { message, .. } => EngineError::Command {
                command: cmd.to_string(),
                message,
            },
            other => other,
        })?;
        Ok(result)
    }

    fn circuit_name(&mut self) -> EngineResult<String> {
        // SAFETY: engine-owned string, copied immediately.
        let name = unsafe { read_cstr(ffi::Circuit_Get_Name()) };
        self.check()?;
        Ok(name)
    }

    fn all_bus_names(&mut self) -> EngineResult<Vec<String>> {
        self.strings(ffi::Circuit_Get_AllBusNames)
    }

    fn all_element_names(&mut self) -> EngineResult<Vec<String>> {
        self.strings(ffi::Circuit_Get_AllElementNames)
    }

    fn class_element_names(&mut self, class: &ElementClass) -> EngineResult<Vec<String>> {
        let class_name = to_cstring(class.dss_name())?;
        // SAFETY: `class_name` outlives the call.
        let found = unsafe { ffi::Circuit_SetActiveClass(class_name.as_ptr()) };
        self.check()?;
        if found <= 0 {
            return Ok(Vec::new());
        }
        self.strings(ffi::ActiveClass_Get_AllNames)
    }

    fn set_active_bus(&mut self, bus: &str) -> EngineResult<bool> {
        let c = to_cstring(bus)?;
        // SAFETY: `c` outlives the call.
        let index = unsafe { ffi::Circuit_SetActiveBus(c.as_ptr()) };
        self.check()?;
        Ok(index >= 0)
    }

    fn bus_num_nodes(&mut self) -> EngineResult<usize> {
        // SAFETY: no arguments.
        let n = unsafe { ffi::Bus_Get_NumNodes() };
        self.check()?;
        Ok(n.max(0) as usize)
    }

    fn bus_voltages(&mut self, form: VoltageForm) -> EngineResult<Vec<f64>> {
        let getter: ffi::DoubleGetter = match form {
            VoltageForm::PuMagAngle => ffi::Bus_Get_puVmagAngle,
            VoltageForm::MagAngle => ffi::Bus_Get_VMagAngle,
            VoltageForm::PuRect => ffi::Bus_Get_puVoltages,
            VoltageForm::Rect => ffi::Bus_Get_Voltages,
        };
        self.doubles(getter)
    }

    fn set_active_element(&mut self, element: &ElementRef) -> EngineResult<Option<ElementRef>> {
        let name = to_cstring(&element.name)?;
        let active = self.select_by_class(&element.class, &name)?;
        if active != element.name {
            // The name setters raise "not found" on a miss; drain it.
            if let Err(e) = self.check() {
                debug!(backend = BACKEND, element = %element, error = %e, "select missed");
            }
            self.active_class = None;
            return Ok(None);
        }
        self.check()?;
        self.active_class = Some(element.class.clone());
        Ok(Some(element.clone()))
    }

    fn element_bus_names(&mut self) -> EngineResult<Vec<String>> {
        self.strings(ffi::CktElement_Get_BusNames)
    }

    fn element_num_phases(&mut self) -> EngineResult<usize> {
        // SAFETY: no arguments.
        let n = unsafe { ffi::CktElement_Get_NumPhases() };
        self.check()?;
        Ok(n.max(0) as usize)
    }

    fn element_array(&mut self, array: ElementArray) -> EngineResult<Vec<f64>> {
        let getter: ffi::DoubleGetter = match array {
            ElementArray::Powers => ffi::CktElement_Get_Powers,
            ElementArray::Currents => ffi::CktElement_Get_Currents,
            ElementArray::CurrentsMagAng => ffi::CktElement_Get_CurrentsMagAng,
            ElementArray::Voltages => ffi::CktElement_Get_Voltages,
            ElementArray::VoltagesMagAng => ffi::CktElement_Get_VoltagesMagAng,
        };
        self.doubles(getter)
    }

    fn element_property_names(&mut self) -> EngineResult<Vec<String>> {
        self.strings(ffi::CktElement_Get_AllPropertyNames)
    }

    fn property_value(&mut self, index: usize) -> EngineResult<String> {
        // SAFETY: scalar argument; the value string is copied.
        let value = unsafe {
            ffi::DSSProperty_Set_Index(index as i32);
            read_cstr(ffi::DSSProperty_Get_Val())
        };
        self.check()?;
        Ok(value)
    }

    fn set_property_value(&mut self, index: usize, value: &str) -> EngineResult<()> {
        let c = to_cstring(value)?;
        // SAFETY: `c` outlives the call.
        unsafe {
            ffi::DSSProperty_Set_Index(index as i32);
            ffi::DSSProperty_Set_Val(c.as_ptr());
        }
        self.check()
    }

    fn open_terminal(&mut self, terminal: usize, phase: usize) -> EngineResult<()> {
        // SAFETY: scalar arguments.
        unsafe { ffi::CktElement_Open(terminal as i32, phase as i32) };
        self.check()
    }

    fn close_terminal(&mut self, terminal: usize, phase: usize) -> EngineResult<()> {
        // SAFETY: scalar arguments.
        unsafe { ffi::CktElement_Close(terminal as i32, phase as i32) };
        self.check()
    }

    fn is_open(&mut self, terminal: usize, phase: usize) -> EngineResult<bool> {
        // SAFETY: scalar arguments.
        let open = unsafe { ffi::CktElement_IsOpen(terminal as i32, phase as i32) };
        self.check()?;
        Ok(open != 0)
    }

    fn set_kw(&mut self, kw: f64) -> EngineResult<()> {
        // SAFETY: scalar arguments on the element selected by class.
        match self.active_class()? {
            ElementClass::Load => unsafe { ffi::Loads_Set_kW(kw) },
            ElementClass::Generator => unsafe { ffi::Generators_Set_kW(kw) },
            ElementClass::PV => unsafe { ffi::PVSystems_Set_Pmpp(kw) },
            other => {
                return Err(EngineError::NotSupported {
                    backend: BACKEND,
                    what: format!("kW setpoint on {other}"),
                });
            }
        }
        self.check()
    }

    fn set_kvar(&mut self, kvar: f64) -> EngineResult<()> {
        // SAFETY: scalar arguments on the element selected by class.
        match self.active_class()? {
            ElementClass::Load => unsafe { ffi::Loads_Set_kvar(kvar) },
            ElementClass::Generator => unsafe { ffi::Generators_Set_kvar(kvar) },
            ElementClass::PV => unsafe { ffi::PVSystems_Set_kvar(kvar) },
            other => {
                return Err(EngineError::NotSupported {
                    backend: BACKEND,
                    what: format!("kvar setpoint on {other}"),
                });
            }
        }
        self.check()
    }

    fn tap_number(&mut self) -> EngineResult<i32> {
        // SAFETY: no arguments.
        let tap = unsafe { ffi::RegControls_Get_TapNumber() };
        self.check()?;
        Ok(tap)
    }

    fn set_tap_number(&mut self, tap: i32) -> EngineResult<()> {
        // SAFETY: scalar argument.
        unsafe { ffi::RegControls_Set_TapNumber(tap) };
        self.check()
    }

    fn pt_ratio(&mut self) -> EngineResult<f64> {
        // SAFETY: no arguments.
        let ratio = unsafe { ffi::CapControls_Get_PTratio() };
        self.check()?;
        Ok(ratio)
    }

    fn set_pt_ratio(&mut self, ratio: f64) -> EngineResult<()> {
        // SAFETY: scalar argument.
        unsafe { ffi::CapControls_Set_PTratio(ratio) };
        self.check()
    }

    fn solve(&mut self, mode: SolveMode) -> EngineResult<String> {
        match mode {
            // The text interface reports convergence problems as result text.
            SolveMode::Normal => self.command("solve"),
            SolveMode::NoControl => {
                // SAFETY: no arguments.
                unsafe { ffi::Solution_SolveNoControl() };
                self.check()?;
                Ok(String::new())
            }
        }
    }

    fn update_storage(&mut self) -> EngineResult<()> {
        // SAFETY: no arguments.
        unsafe { ffi::Circuit_UpdateStorage() };
        self.check()
    }

    fn set_solution_number(&mut self, number: u32) -> EngineResult<()> {
        // SAFETY: scalar argument.
        unsafe { ffi::Solution_Set_Number(number as i32) };
        self.check()
    }

    fn set_hour(&mut self, hour: u32) -> EngineResult<()> {
        // SAFETY: scalar argument.
        unsafe { ffi::Solution_Set_Hour(hour as i32) };
        self.check()
    }

    fn set_step_size(&mut self, seconds: f64) -> EngineResult<()> {
        // SAFETY: scalar argument.
        unsafe { ffi::Solution_Set_StepSize(seconds) };
        self.check()
    }

    fn total_power(&mut self) -> EngineResult<Vec<f64>> {
        self.doubles(ffi::Circuit_Get_TotalPower)
    }

    fn losses(&mut self) -> EngineResult<(f64, f64)> {
        let values = self.doubles(ffi::Circuit_Get_Losses)?;
        match values.as_slice() {
            [p, q, ..] => Ok((*p, *q)),
            _ => Err(EngineError::IndexOob {
                what: "losses",
                index: 1,
                len: values.len(),
            }),
        }
    }
}
