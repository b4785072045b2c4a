mod flareup;
mod helpers;
mod meal;
mod settings;
mod timeline;

pub(crate) use flareup::{
    cmd_flareup_before, cmd_flareup_delete, cmd_flareup_list, cmd_flareup_log, cmd_flareup_show,
};
pub(crate) use meal::{
    MealFields, cmd_meal_add, cmd_meal_before, cmd_meal_delete, cmd_meal_edit, cmd_meal_list,
    cmd_meal_recent, cmd_meal_show,
};
pub(crate) use settings::{
    cmd_clear, cmd_guess, cmd_settings_set, cmd_settings_show, cmd_storage, cmd_tags,
};
pub(crate) use timeline::cmd_timeline;
