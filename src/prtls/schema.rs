//! The field schema of a particle ensemble.
//!
//! Everything that needs to know which per-particle fields exist (the
//! column layout of [`Prtls`](crate::prtls::Prtls), compaction, merging,
//! the Rust `LocalParticle` and the generated C interface) walks the one
//! ordered list declared in this file.
use num_traits::NumCast;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

/// Marks slots that were never populated or were removed for good.
pub const LAST_INVALID_STATE: i64 = -999_999_999;

/// Storage type of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarType {
    F64,
    I64,
    U32,
}

impl VarType {
    pub fn c_type(self) -> &'static str {
        match self {
            VarType::F64 => "double",
            VarType::I64 => "int64_t",
            VarType::U32 => "uint32_t",
        }
    }
}

/// Element types that can live in a per-particle column.
pub trait FieldValue:
    Copy + Send + Sync + PartialEq + fmt::Debug + NumCast + 'static
{
    const TYPE: VarType;

    /// The sentinel written into invalid slots.
    fn invalid() -> Self;

    fn slice(col: &Column) -> &[Self];

    fn vec_mut(col: &mut Column) -> &mut Vec<Self>;

    fn wrap(v: Vec<Self>) -> Column;
}

macro_rules! impl_field_value {
    ($ty:ident, $variant:ident, $invalid:expr) => {
        impl FieldValue for $ty {
            const TYPE: VarType = VarType::$variant;

            #[inline(always)]
            fn invalid() -> Self {
                $invalid
            }

            #[inline(always)]
            fn slice(col: &Column) -> &[Self] {
                match col {
                    Column::$variant(v) => v,
                    _ => unreachable!("column does not hold {}", stringify!($ty)),
                }
            }

            #[inline(always)]
            fn vec_mut(col: &mut Column) -> &mut Vec<Self> {
                match col {
                    Column::$variant(v) => v,
                    _ => unreachable!("column does not hold {}", stringify!($ty)),
                }
            }

            fn wrap(v: Vec<Self>) -> Column {
                Column::$variant(v)
            }
        }

        impl From<Vec<$ty>> for Column {
            fn from(v: Vec<$ty>) -> Column {
                Column::$variant(v)
            }
        }

        impl From<&[$ty]> for Column {
            fn from(v: &[$ty]) -> Column {
                Column::$variant(v.to_vec())
            }
        }

        impl From<$ty> for Column {
            fn from(v: $ty) -> Column {
                Column::$variant(vec![v])
            }
        }
    };
}

impl_field_value!(f64, F64, LAST_INVALID_STATE as f64);
impl_field_value!(i64, I64, LAST_INVALID_STATE);
// wraps like an unsigned store of the sentinel
impl_field_value!(u32, U32, LAST_INVALID_STATE as u32);

/// One typed array of values.
#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    F64(Vec<f64>),
    I64(Vec<i64>),
    U32(Vec<u32>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::F64(v) => v.len(),
            Column::I64(v) => v.len(),
            Column::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ty(&self) -> VarType {
        match self {
            Column::F64(_) => VarType::F64,
            Column::I64(_) => VarType::I64,
            Column::U32(_) => VarType::U32,
        }
    }

    /// Element-wise conversion. `None` if any value does not fit `T`.
    pub fn cast<T: FieldValue>(&self) -> Option<Vec<T>> {
        match self {
            Column::F64(v) => v.iter().map(|&x| <T as NumCast>::from(x)).collect(),
            Column::I64(v) => v.iter().map(|&x| <T as NumCast>::from(x)).collect(),
            Column::U32(v) => v.iter().map(|&x| <T as NumCast>::from(x)).collect(),
        }
    }

    pub(crate) fn swap(&mut self, i1: usize, i2: usize) {
        match self {
            Column::F64(v) => v.swap(i1, i2),
            Column::I64(v) => v.swap(i1, i2),
            Column::U32(v) => v.swap(i1, i2),
        }
    }

    /// `self[dst] = src[i_src]`. Both columns hold the same type.
    pub(crate) fn copy_from(&mut self, dst: usize, src: &Column, i_src: usize) {
        match (self, src) {
            (Column::F64(a), Column::F64(b)) => a[dst] = b[i_src],
            (Column::I64(a), Column::I64(b)) => a[dst] = b[i_src],
            (Column::U32(a), Column::U32(b)) => a[dst] = b[i_src],
            _ => unreachable!("columns of one field always share a type"),
        }
    }

    pub(crate) fn truncated(&self, len: usize) -> Column {
        match self {
            Column::F64(v) => Column::F64(v[..len].to_vec()),
            Column::I64(v) => Column::I64(v[..len].to_vec()),
            Column::U32(v) => Column::U32(v[..len].to_vec()),
        }
    }

    /// Extends the column to `len` with the sentinel.
    pub(crate) fn padded(mut self, len: usize) -> Column {
        match &mut self {
            Column::F64(v) => v.resize(len, f64::invalid()),
            Column::I64(v) => v.resize(len, i64::invalid()),
            Column::U32(v) => v.resize(len, u32::invalid()),
        }
        self
    }

    pub(crate) fn filled<T: FieldValue>(value: T, len: usize) -> Column {
        T::wrap(vec![value; len])
    }
}

/// Fields that are read freely and written freely.
pub struct Writable;

/// Fields derived from others. Only the kinematics may write them.
pub struct Derived;

pub trait Access {
    const DERIVED: bool;
}

impl Access for Writable {
    const DERIVED: bool = false;
}

impl Access for Derived {
    const DERIVED: bool = true;
}

/// Typed handle to one per-particle field.
pub struct Var<T, A = Writable> {
    name: &'static str,
    index: usize,
    _marker: PhantomData<fn() -> (T, A)>,
}

impl<T, A> Clone for Var<T, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, A> Copy for Var<T, A> {}

impl<T, A> fmt::Debug for Var<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Var({})", self.name)
    }
}

impl<T, A> Var<T, A> {
    const fn new(name: &'static str, index: usize) -> Self {
        Var {
            name,
            index,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Position in [`PER_PARTICLE_VARS`].
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Untyped description of a per-particle field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VarDef {
    pub name: &'static str,
    pub ty: VarType,
    pub derived: bool,
}

/// Description of a scalar field (one value per ensemble).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScalarDef {
    pub name: &'static str,
    pub ty: VarType,
}

pub const SIZE_VARS: &[ScalarDef] = &[
    ScalarDef {
        name: "_capacity",
        ty: VarType::I64,
    },
    ScalarDef {
        name: "_num_active_particles",
        ty: VarType::I64,
    },
    ScalarDef {
        name: "_num_lost_particles",
        ty: VarType::I64,
    },
];

pub const SCALAR_VARS: &[ScalarDef] = &[
    ScalarDef {
        name: "q0",
        ty: VarType::F64,
    },
    ScalarDef {
        name: "mass0",
        ty: VarType::F64,
    },
];

macro_rules! per_particle_vars {
    ($($(#[$meta:meta])* ($konst:ident, $ty:ident, $access:ident, $name:literal)),* $(,)?) => {
        #[allow(non_camel_case_types, clippy::upper_case_acronyms, dead_code)]
        #[repr(usize)]
        enum VarIndex {
            $($konst,)*
        }

        $(
            $(#[$meta])*
            pub const $konst: Var<$ty, $access> = Var::new($name, VarIndex::$konst as usize);
        )*

        /// Every per-particle field, in layout order.
        pub const PER_PARTICLE_VARS: &[VarDef] = &[
            $(VarDef {
                name: $name,
                ty: <$ty as FieldValue>::TYPE,
                derived: <$access as Access>::DERIVED,
            },)*
        ];
    };
}

per_particle_vars! {
    /// Reference momentum [eV].
    (P0C, f64, Writable, "p0c"),
    (GAMMA0, f64, Writable, "gamma0"),
    (BETA0, f64, Writable, "beta0"),
    /// Accumulated path length [m].
    (S, f64, Writable, "s"),
    (X, f64, Writable, "x"),
    (Y, f64, Writable, "y"),
    /// Px / (m/m0 * p0c).
    (PX, f64, Writable, "px"),
    (PY, f64, Writable, "py"),
    /// beta (s/beta0 - ct) [m].
    (ZETA, f64, Writable, "zeta"),
    /// ptau / beta0.
    (PSIGMA, f64, Derived, "psigma"),
    /// Pc / (m/m0 * p0c) - 1.
    (DELTA, f64, Derived, "delta"),
    /// 1 / (1 + delta).
    (RPP, f64, Derived, "rpp"),
    /// beta / beta0.
    (RVV, f64, Derived, "rvv"),
    /// (q/q0) / (m/m0).
    (CHI, f64, Writable, "chi"),
    (CHARGE_RATIO, f64, Writable, "charge_ratio"),
    /// Macro-particle multiplicity.
    (WEIGHT, f64, Writable, "weight"),
    (PARTICLE_ID, i64, Writable, "particle_id"),
    (AT_ELEMENT, i64, Writable, "at_element"),
    (AT_TURN, i64, Writable, "at_turn"),
    /// `> 0` alive, `<= 0` lost, [`LAST_INVALID_STATE`] empty slot.
    (STATE, i64, Writable, "state"),
    (PARENT_PARTICLE_ID, i64, Writable, "parent_particle_id"),
    (RNG_S1, u32, Writable, "__rng_s1"),
    (RNG_S2, u32, Writable, "__rng_s2"),
    (RNG_S3, u32, Writable, "__rng_s3"),
    (RNG_S4, u32, Writable, "__rng_s4"),
}

/// Index of a per-particle field by name.
pub fn var_index(name: &str) -> Option<usize> {
    PER_PARTICLE_VARS.iter().position(|d| d.name == name)
}

/// Names of the four longitudinal fields kept consistent by the
/// kinematics.
pub fn energy_varnames() -> Vec<&'static str> {
    PER_PARTICLE_VARS
        .iter()
        .filter(|d| d.derived)
        .map(|d| d.name)
        .collect()
}

/// A named bag of columns, used both as construction input and as the
/// export of an ensemble.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldValues {
    entries: BTreeMap<String, Column>,
}

impl FieldValues {
    pub fn new() -> FieldValues {
        FieldValues::default()
    }

    pub fn with<S: Into<String>, C: Into<Column>>(mut self, name: S, col: C) -> FieldValues {
        self.insert(name, col);
        self
    }

    pub fn insert<S: Into<String>, C: Into<Column>>(&mut self, name: S, col: C) {
        self.entries.insert(name.into(), col.into());
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
